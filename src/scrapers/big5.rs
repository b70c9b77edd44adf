//! Outbound Big5 encoding for legacy query parameters.

use encoding_rs::BIG5;

use super::error::ScrapeError;

/// Encode `text` as Big5 bytes. Characters with no Big5 mapping are an error.
pub fn encode_big5(text: &str) -> Result<Vec<u8>, ScrapeError> {
    let (bytes, _, had_unmappable) = BIG5.encode(text);
    if had_unmappable {
        return Err(ScrapeError::Encoding(text.to_string()));
    }
    Ok(bytes.into_owned())
}

/// Percent-encode the Big5 bytes of `text` for a query string or form body.
pub fn big5_url_encode(text: &str) -> Result<String, ScrapeError> {
    let bytes = encode_big5(text)?;
    Ok(urlencoding::encode_binary(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encodes_traditional_chinese() {
        assert_eq!(encode_big5("資訊").unwrap(), vec![0xB8, 0xEA, 0xB0, 0x54]);
        assert_eq!(big5_url_encode("微積分").unwrap(), "%B7L%BFn%A4%C0");
    }

    #[test]
    fn test_ascii_is_unchanged() {
        assert_eq!(big5_url_encode("Java").unwrap(), "Java");
        assert_eq!(big5_url_encode("a b").unwrap(), "a%20b");
    }

    #[test]
    fn test_unmappable_is_permanent() {
        let err = big5_url_encode("😀").unwrap_err();
        assert!(matches!(err, ScrapeError::Encoding(_)));
        assert!(err.is_permanent());
    }
}
