//! Record identifiers and size helpers

use uuid::Uuid;

/// Generate an opaque unique identifier for a record.
///
/// Identifiers carry no ordering; history order is insertion order.
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Encoded size of `text` in bytes (UTF-8), independent of character count
pub fn byte_size(text: &str) -> usize {
    text.len()
}

/// Length of `text` in UTF-16 code units, the unit positions are counted in
pub fn text_len(text: &str) -> usize {
    text.encode_utf16().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let a = generate_id();
        let b = generate_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn test_byte_size_counts_encoded_bytes() {
        assert_eq!(byte_size("hello"), 5);
        assert_eq!(byte_size("héllo"), 6);
        assert_eq!(byte_size("👋"), 4);
    }

    #[test]
    fn test_text_len_counts_utf16_units() {
        assert_eq!(text_len("hello"), 5);
        assert_eq!(text_len("héllo"), 5);
        assert_eq!(text_len("👋"), 2);
    }
}
