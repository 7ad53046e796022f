//! Display helpers shared by cards, the detail page and the search predicate.

use crate::models::Property;
use chrono::{DateTime, Utc};
use url::Url;

pub const PLACEHOLDER_IMAGE: &str = "https://via.placeholder.com/300x200?text=Sem+Imagem";

/// Numeric value of a price text.
///
/// Everything except digits and `.` is stripped, then the longest leading
/// decimal number is taken. Anything unparseable is 0.
pub fn parse_price(text: &str) -> f64 {
    let stripped: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    let mut end = 0;
    let mut seen_dot = false;
    for (idx, c) in stripped.char_indices() {
        if c == '.' {
            if seen_dot {
                break;
            }
            seen_dot = true;
        }
        end = idx + c.len_utf8();
    }

    let number = stripped[..end].trim_end_matches('.');
    number.parse().unwrap_or(0.0)
}

/// Price label for cards: BRL currency when the text is numeric.
pub fn format_price(price: Option<&str>) -> String {
    let Some(price) = price.map(str::trim).filter(|p| !p.is_empty()) else {
        return "Consulte o preço".to_string();
    };
    if price.contains("R$") {
        return price.to_string();
    }
    match parse_localized_number(price) {
        Some(value) => format_brl(value),
        None => price.to_string(),
    }
}

/// Read a pt-BR or plain number: "1.500.000,50", "1500000.5", "450000".
fn parse_localized_number(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
        .collect();
    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let normalized = if cleaned.contains(',') {
        cleaned.replace('.', "").replacen(',', ".", 1)
    } else if is_thousands_grouped(&cleaned) {
        cleaned.replace('.', "")
    } else {
        cleaned
    };
    normalized.parse().ok()
}

/// "450.000" and "1.500.000" group thousands; "450000.50" has a decimal point.
fn is_thousands_grouped(text: &str) -> bool {
    let digits = text.trim_start_matches('-');
    let mut groups = digits.split('.');
    let head = groups.next().unwrap_or_default();
    let mut tail = groups.peekable();

    tail.peek().is_some()
        && (1..=3).contains(&head.len())
        && tail.all(|group| group.len() == 3 && group.chars().all(|c| c.is_ascii_digit()))
}

/// "R$ 1.234.567,89"
pub fn format_brl(value: f64) -> String {
    let cents = (value.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let fraction = cents % 100;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (idx, digit) in whole.chars().enumerate() {
        if idx > 0 && (whole.len() - idx) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}R$ {},{:02}", sign, grouped, fraction)
}

/// "120m²"
pub fn format_area(area: Option<f64>) -> String {
    let area = area.unwrap_or(0.0);
    if area.fract() == 0.0 {
        format!("{}m²", area as i64)
    } else {
        format!("{}m²", area)
    }
}

/// Relative age of a listing in Portuguese, e.g. "3 semanas atrás".
pub fn time_ago(created_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(created_at) = created_at else {
        return "N/A".to_string();
    };

    const DAY_MS: i64 = 24 * 60 * 60 * 1000;
    let elapsed_ms = (now - created_at).num_milliseconds().abs();
    let days = (elapsed_ms + DAY_MS - 1) / DAY_MS;

    match days {
        1 => "1 dia atrás".to_string(),
        d if d < 7 => format!("{} dias atrás", d),
        d if d < 30 => format!("{} semanas atrás", (d + 6) / 7),
        d => format!("{} meses atrás", (d + 29) / 30),
    }
}

/// Cover image of a listing, or the placeholder when it has none.
pub fn cover_image(property: &Property) -> &str {
    property
        .images
        .first()
        .map(String::as_str)
        .unwrap_or(PLACEHOLDER_IMAGE)
}

/// Embeddable player URL for `youtu.be/<id>` and `youtube.com/watch?v=<id>` links.
pub fn youtube_embed_url(video_url: &str) -> Option<String> {
    let parsed = Url::parse(video_url.trim()).ok()?;
    let host = parsed.host_str()?;

    let video_id = if host.contains("youtu.be") {
        parsed.path().trim_start_matches('/').to_string()
    } else if host.contains("youtube.com") {
        parsed
            .query_pairs()
            .find(|(key, _)| key == "v")
            .map(|(_, value)| value.into_owned())?
    } else {
        return None;
    };

    if video_id.is_empty() {
        return None;
    }
    Some(format!("https://www.youtube.com/embed/{}", video_id))
}

/// WhatsApp deep link with a prefilled enquiry about `property`.
pub fn whatsapp_url(phone: &str, property: &Property) -> String {
    let message = format!(
        "Olá, estou interessado na propriedade: {} (ID: {})",
        property.title.as_deref().unwrap_or_default(),
        property.id
    );
    let base = format!("https://wa.me/{}", phone);
    match Url::parse_with_params(&base, &[("text", message.as_str())]) {
        Ok(link) => link.to_string(),
        Err(_) => base,
    }
}
