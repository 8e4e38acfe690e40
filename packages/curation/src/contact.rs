//! Contact normalization.
//!
//! Turns scraped phone/WhatsApp strings into canonical forms: phone as
//! `+<countrycode><national>` (digits only after the `+`), WhatsApp as a
//! `https://wa.me/<digits>` deep link. Normalization is idempotent and
//! returns `None` instead of failing when no plausible digits are present.

use serde::{Deserialize, Serialize};

use crate::types::config::ContactConfig;

/// Canonical contact information derived from raw scraped strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedContact {
    /// Phone in `+<countrycode><national>` form.
    pub phone: Option<String>,

    /// WhatsApp deep link.
    pub whatsapp: Option<String>,
}

impl NormalizedContact {
    /// True if at least one channel was recovered.
    pub fn has_any(&self) -> bool {
        self.phone.is_some() || self.whatsapp.is_some()
    }

    /// Derive a contact from a batch of raw strings: the first string that
    /// normalizes to a phone wins, likewise for WhatsApp links.
    pub fn from_raw(raw_contacts: &[String], config: &ContactConfig) -> Self {
        let mut contact = Self::default();
        for raw in raw_contacts {
            if contact.whatsapp.is_none() && looks_like_whatsapp(raw, config) {
                contact.whatsapp = normalize_whatsapp(raw, config);
                // A WhatsApp link also yields a dialable number.
                if contact.phone.is_none() {
                    contact.phone = normalize_phone(raw, config);
                }
                continue;
            }
            if contact.phone.is_none() {
                contact.phone = normalize_phone(raw, config);
            }
        }
        contact
    }
}

/// Normalize an arbitrary phone string to `+<countrycode><national>`.
///
/// Steps, in order:
/// 1. strip everything except digits and a leading `+`;
/// 2. already international (`+` prefix) is kept as-is;
/// 3. a number starting with the domestic country code at international
///    length gets a `+` prefix;
/// 4. a plausible domestic-length number gets the default country code;
/// 5. anything else gets a `+` verbatim as a best-effort fallback.
///
/// Returns `None` when the input contains no digits. Applying the
/// function to its own output is a no-op.
pub fn normalize_phone(raw: &str, config: &ContactConfig) -> Option<String> {
    let trimmed = raw.trim();
    let has_plus = trimmed.starts_with('+');
    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.is_empty() {
        return None;
    }

    if has_plus {
        return Some(format!("+{}", digits));
    }

    let len = digits.len();
    let (intl_min, intl_max) = config.international_len;
    if digits.starts_with(&config.country_code) && len >= intl_min && len <= intl_max {
        return Some(format!("+{}", digits));
    }

    let (nat_min, nat_max) = config.national_len;
    if len >= nat_min && len <= nat_max {
        return Some(format!("+{}{}", config.country_code, digits));
    }

    Some(format!("+{}", digits))
}

/// Normalize a raw number or WhatsApp link into a canonical deep link.
///
/// Accepts `wa.me`/`api.whatsapp.com` style links or bare numbers; the
/// first plausible digit run (8-15 digits) is extracted, pushed through
/// [`normalize_phone`], and rebuilt as `https://<domain>/<digits>`.
pub fn normalize_whatsapp(raw: &str, config: &ContactConfig) -> Option<String> {
    let digits = first_digit_run(raw, 8, 15)?;
    let phone = normalize_phone(&digits, config)?;
    let dialable: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    Some(format!("https://{}/{}", config.whatsapp_domain, dialable))
}

/// Search candidates for fuzzy phone matching against noisy stored values.
///
/// Returns, in order: the full international digits (without `+`), the
/// bare national number, and 2-3 contiguous chunks (area-code-like
/// splits) usable for substring search.
pub fn phone_search_candidates(raw: &str, config: &ContactConfig) -> Vec<String> {
    let Some(phone) = normalize_phone(raw, config) else {
        return Vec::new();
    };
    let international: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();

    let national = international
        .strip_prefix(config.country_code.as_str())
        .unwrap_or(&international)
        .to_string();

    let mut candidates = vec![international.clone(), national.clone()];

    // Area-code-like splits of the national number.
    if national.len() > 6 {
        candidates.push(national[..3].to_string());
        candidates.push(national[..6].to_string());
        candidates.push(national[3..].to_string());
    } else if national.len() > 3 {
        candidates.push(national[..3].to_string());
        candidates.push(national[3..].to_string());
    }

    candidates.dedup();
    candidates
}

/// True if a raw string plausibly refers to WhatsApp rather than a plain
/// phone number.
fn looks_like_whatsapp(raw: &str, config: &ContactConfig) -> bool {
    let lower = raw.to_lowercase();
    lower.contains(&config.whatsapp_domain)
        || lower.contains("whatsapp")
        || lower.contains("wa.me")
}

/// Extract the first contiguous digit run with length in `[min, max]`.
///
/// Separator characters inside a number (spaces, dots, dashes) are treated
/// as part of the run so `"333 123.45.67"` is a single 10-digit run.
fn first_digit_run(raw: &str, min: usize, max: usize) -> Option<String> {
    let mut run = String::new();

    let flush = |run: &str| {
        let len = run.len();
        (len >= min && len <= max).then(|| run.to_string())
    };

    for c in raw.chars() {
        if c.is_ascii_digit() {
            run.push(c);
        } else if matches!(c, ' ' | '.' | '-' | '\u{a0}') && !run.is_empty() {
            // separator inside a formatted number; keep accumulating
        } else {
            if let Some(found) = flush(&run) {
                return Some(found);
            }
            run.clear();
        }
    }

    flush(&run)
}
