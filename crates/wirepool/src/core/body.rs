//! Request body encoding.

use bytes::Bytes;
use uuid::Uuid;

use crate::data::Payload;

/// An encoded body plus the Content-Type it implies, if any.
#[derive(Debug)]
pub(crate) struct EncodedBody {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

/// Encode a payload into wire bytes.
///
/// Form pairs become a URL-encoded body, multipart pairs a
/// `multipart/form-data` body with a freshly generated boundary. Raw
/// bytes and text pass through without a Content-Type.
pub(crate) fn encode_payload(payload: &Payload) -> EncodedBody {
    match payload {
        Payload::Form(pairs) => {
            let body = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
                .finish();
            EncodedBody {
                bytes: Bytes::from(body),
                content_type: Some("application/x-www-form-urlencoded".to_string()),
            }
        }
        Payload::Multipart(pairs) => {
            let boundary = format!("----wirepool{}", Uuid::new_v4().simple());
            let mut out = Vec::new();
            for (name, value) in pairs {
                out.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
                out.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                out.extend_from_slice(value.as_bytes());
                out.extend_from_slice(b"\r\n");
            }
            out.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
            EncodedBody {
                bytes: Bytes::from(out),
                content_type: Some(format!("multipart/form-data; boundary={boundary}")),
            }
        }
        Payload::Bytes(bytes) => EncodedBody {
            bytes: bytes.clone(),
            content_type: None,
        },
        Payload::Text(text) => EncodedBody {
            bytes: Bytes::copy_from_slice(text.as_bytes()),
            content_type: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_is_url_encoded() {
        let payload = Payload::Form(vec![
            ("q".to_string(), "rust lang".to_string()),
            ("page".to_string(), "1&2".to_string()),
        ]);
        let encoded = encode_payload(&payload);
        assert_eq!(&encoded.bytes[..], b"q=rust+lang&page=1%262");
        assert_eq!(
            encoded.content_type.as_deref(),
            Some("application/x-www-form-urlencoded")
        );
    }

    #[test]
    fn multipart_frames_every_field() {
        let payload = Payload::Multipart(vec![
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "two".to_string()),
        ]);
        let encoded = encode_payload(&payload);
        let ctype = encoded.content_type.unwrap();
        let boundary = ctype
            .strip_prefix("multipart/form-data; boundary=")
            .unwrap()
            .to_string();

        let body = String::from_utf8(encoded.bytes.to_vec()).unwrap();
        assert!(body.contains(&format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\n1\r\n"
        )));
        assert!(body.contains("name=\"b\"\r\n\r\ntwo\r\n"));
        assert!(body.ends_with(&format!("--{boundary}--\r\n")));
    }

    #[test]
    fn multipart_boundaries_are_unique_per_body() {
        let payload = Payload::Multipart(vec![("a".to_string(), "1".to_string())]);
        let first = encode_payload(&payload).content_type.unwrap();
        let second = encode_payload(&payload).content_type.unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn bytes_pass_through_unchanged() {
        let raw = Bytes::from_static(&[0u8, 159, 146, 150]);
        let encoded = encode_payload(&Payload::Bytes(raw.clone()));
        assert_eq!(encoded.bytes, raw);
        assert!(encoded.content_type.is_none());
    }

    #[test]
    fn text_is_utf8_bytes() {
        let encoded = encode_payload(&Payload::Text("héllo".to_string()));
        assert_eq!(&encoded.bytes[..], "héllo".as_bytes());
        assert!(encoded.content_type.is_none());
    }
}
