use crate::domain::UNKNOWN_DEVICE_ID;

/// Turn an identifier into a single NATS subject token
///
/// Subject separators and wildcards (`.`, `*`, `>`) and whitespace become `_`.
pub fn subject_token(id: &str) -> String {
    let token: String = id
        .chars()
        .map(|c| match c {
            '.' | '*' | '>' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect();

    if token.is_empty() {
        UNKNOWN_DEVICE_ID.to_string()
    } else {
        token
    }
}
