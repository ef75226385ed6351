use subtle::ConstantTimeEq;

/// Verify the `X-Telegram-Bot-Api-Secret-Token` header Telegram echoes
/// back on every webhook delivery. Returns true when no secret is
/// configured.
pub fn verify_secret(header: Option<&str>, expected: &Option<String>) -> bool {
    let expected = match expected {
        Some(secret) => secret,
        None => return true,
    };

    match header {
        Some(value) => constant_time_eq(value.as_bytes(), expected.as_bytes()),
        None => false,
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
