pub(crate) fn guess_filename_from_url(url: &str) -> Option<String> {
    // Presigned download links carry the signature in the query string.
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().and_then(|s| {
        if s.is_empty() {
            None
        } else {
            Some(s.to_string())
        }
    })
}

pub(crate) fn urljoin(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_ignores_query_string() {
        assert_eq!(
            guess_filename_from_url("https://bucket.s3.amazonaws.com/a/b/scene_metadata.json?X-Amz-Signature=abc"),
            Some("scene_metadata.json".to_string())
        );
        assert_eq!(guess_filename_from_url("https://host/dir/"), None);
    }

    #[test]
    fn urljoin_handles_slashes() {
        assert_eq!(urljoin("https://h/api/", "/pipelines"), "https://h/api/pipelines");
        assert_eq!(urljoin("https://h/api", "pipelines"), "https://h/api/pipelines");
        assert_eq!(urljoin("https://h/api", "https://other/x"), "https://other/x");
    }
}
