use chardetng::EncodingDetector;
use encoding_rs::Encoding;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPage {
    pub html: String,
    pub encoding_label: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("page bytes are not valid {encoding}")]
    Malformed { encoding: String },
}

/// Decodes a fetched page to UTF-8.
///
/// Order of precedence: byte-order mark, `charset=` in the Content-Type
/// header, then a chardetng guess over the whole body.
pub fn decode_page(bytes: &[u8], content_type: Option<&str>) -> Result<DecodedPage, DecodeError> {
    let encoding = Encoding::for_bom(bytes)
        .map(|(enc, _)| enc)
        .or_else(|| {
            content_type
                .and_then(charset_param)
                .and_then(|label| Encoding::for_label(label.as_bytes()))
        })
        .unwrap_or_else(|| {
            let mut detector = EncodingDetector::new();
            detector.feed(bytes, true);
            detector.guess(None, true)
        });

    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(DecodeError::Malformed {
            encoding: used.name().to_string(),
        });
    }
    Ok(DecodedPage {
        html: text.into_owned(),
        encoding_label: used.name().to_string(),
    })
}

fn charset_param(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|part| {
        let (key, value) = part.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches(['"', '\'']).to_string())
    })
}
