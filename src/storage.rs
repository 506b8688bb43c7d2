//! R2 blob helpers for uploaded student documents.

use worker::*;

/// R2 key for an application's supporting document.
///
/// Format: `applications/{application_id}/{file_name}`
pub fn document_key(application_id: &str, file_name: &str) -> String {
    format!("applications/{application_id}/{}", sanitize_file_name(file_name))
}

/// Keep only the final path segment and replace characters that are not
/// safe in an object key.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name);
    base.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Store a document in R2 and return its size.
pub async fn put_blob(bucket: &Bucket, key: &str, data: Vec<u8>) -> Result<u64> {
    let size = data.len() as u64;
    bucket.put(key, data).execute().await?;
    Ok(size)
}

/// Retrieve a document from R2. Returns None if not found.
pub async fn get_blob(bucket: &Bucket, key: &str) -> Result<Option<Vec<u8>>> {
    let obj = bucket.get(key).execute().await?;
    match obj {
        Some(obj) => match obj.body() {
            Some(body) => {
                let bytes = body.bytes().await?;
                Ok(Some(bytes))
            }
            None => Ok(Some(Vec::new())),
        },
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_key_format() {
        assert_eq!(
            document_key("APP1700000000000", "transcript.pdf"),
            "applications/APP1700000000000/transcript.pdf"
        );
    }

    #[test]
    fn sanitize_strips_directories() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\docs\\cv.pdf"), "cv.pdf");
    }

    #[test]
    fn sanitize_replaces_unsafe_characters() {
        assert_eq!(sanitize_file_name("my cv (final).pdf"), "my_cv__final_.pdf");
        assert_eq!(sanitize_file_name("résumé.pdf"), "r_sum_.pdf");
    }
}
