//! Byte retrieval for registry URLs: `file://` and bare paths are read from
//! disk, `http(s)://` goes through a blocking client.

use std::{fs, path::Path};

use url::Url;

use crate::error::{Error, Result};

#[cfg(feature = "download")]
const USER_AGENT: &str = concat!("vtlivability/", env!("CARGO_PKG_VERSION"));

/// Parse a URL, or treat the string as a local path.
pub fn resolve_location(location: &str) -> Result<Url> {
    if let Ok(url) = Url::parse(location) {
        // Windows drive letters parse as one-letter schemes.
        if url.scheme().len() > 1 { return Ok(url) }
    }
    let path = Path::new(location);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| Error::Config(format!("cannot resolve {location}: {e}")))?
            .join(path)
    };
    let url = if location.ends_with('/') || absolute.is_dir() {
        Url::from_directory_path(&absolute)
    } else {
        Url::from_file_path(&absolute)
    };
    url.map_err(|_| Error::Config(format!("cannot turn {} into a file URL", absolute.display())))
}

/// Fetch the whole resource.
pub fn fetch_bytes(url: &Url) -> Result<Vec<u8>> {
    match fetch_optional(url)? {
        Some(bytes) => Ok(bytes),
        None => Err(Error::Fetch { url: url.to_string(), source: anyhow::anyhow!("resource not found") }),
    }
}

/// Fetch a resource as UTF-8 text (lossy).
pub fn fetch_text(url: &Url) -> Result<String> {
    Ok(String::from_utf8_lossy(&fetch_bytes(url)?).into_owned())
}

/// Fetch a resource that may legitimately be absent (e.g. a `.prj`
/// sidecar); `Ok(None)` for a missing file or a 404/410.
pub fn fetch_optional(url: &Url) -> Result<Option<Vec<u8>>> {
    let fail = |source: anyhow::Error| Error::Fetch { url: url.to_string(), source };
    match url.scheme() {
        "file" => {
            let path = url.to_file_path()
                .map_err(|_| fail(anyhow::anyhow!("not a local file URL")))?;
            log::debug!("[fetch] reading {}", path.display());
            match fs::read(&path) {
                Ok(bytes) => Ok(Some(bytes)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(fail(e.into())),
            }
        }
        "http" | "https" => http_get(url).map_err(fail),
        other => Err(fail(anyhow::anyhow!("unsupported URL scheme {other:?}"))),
    }
}

#[cfg(feature = "download")]
fn http_get(url: &Url) -> anyhow::Result<Option<Vec<u8>>> {
    use std::time::Duration;

    use anyhow::Context;
    use reqwest::{blocking::Client, redirect::Policy, StatusCode};

    log::info!("[fetch] GET {url}");
    let client = Client::builder()
        .user_agent(USER_AGENT)
        .redirect(Policy::limited(10))
        .timeout(Duration::from_secs(120))
        .build()?;

    let resp = client.get(url.as_str()).send().with_context(|| format!("GET {url}"))?;
    if matches!(resp.status(), StatusCode::NOT_FOUND | StatusCode::GONE) {
        return Ok(None);
    }
    let bytes = resp.error_for_status()
        .with_context(|| format!("GET {url} returned error status"))?
        .bytes()
        .with_context(|| format!("reading body of {url}"))?;
    Ok(Some(bytes.to_vec()))
}

#[cfg(not(feature = "download"))]
fn http_get(url: &Url) -> anyhow::Result<Option<Vec<u8>>> {
    anyhow::bail!("cannot fetch {url}: built without the `download` feature")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_paths_become_file_urls() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("towns.csv");
        fs::write(&file, "a\n1\n").unwrap();

        let url = resolve_location(file.to_str().unwrap()).unwrap();
        assert_eq!(url.scheme(), "file");
        assert_eq!(fetch_text(&url).unwrap(), "a\n1\n");
    }

    #[test]
    fn directory_urls_join_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let base = resolve_location(dir.path().to_str().unwrap()).unwrap();
        assert!(base.path().ends_with('/'));
        assert!(base.join("sub/file.csv").unwrap().path().ends_with("/sub/file.csv"));
    }

    #[test]
    fn missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let url = Url::from_file_path(dir.path().join("nope.prj")).unwrap();
        assert!(fetch_optional(&url).unwrap().is_none());
        assert!(matches!(fetch_bytes(&url), Err(Error::Fetch { .. })));
    }

    #[test]
    fn unsupported_scheme() {
        let url = Url::parse("ftp://example.org/data.csv").unwrap();
        assert!(matches!(fetch_bytes(&url), Err(Error::Fetch { .. })));
    }
}
