/// Normalize a worker address to its canonical digits-only form.
///
/// Strips the `whatsapp:` channel prefix, a leading `+`, and any
/// separators, so `whatsapp:+91 99999-00000`, `+919999900000` and
/// `919999900000` all key the same job.
pub fn normalize_phone(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_channel = trimmed
        .strip_prefix("whatsapp:")
        .or_else(|| trimmed.strip_prefix("WhatsApp:"))
        .unwrap_or(trimmed);
    without_channel
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect()
}
