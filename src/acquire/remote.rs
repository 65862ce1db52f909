use crate::{
    acquire::{Acquired, ImagePolicy, decode_image},
    foundation::error::{ArcraftError, ArcraftResult},
    model::ImageOrigin,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Cross-origin image download. Implementations must not send credentials or cookies.
pub trait ImageFetcher {
    fn fetch(&self, url: &url::Url, max_bytes: u64) -> ArcraftResult<FetchedImage>;
}

/// Fetch a remote image and decode it into a local raster, dropping the remote dependency.
///
/// Every failure (bad URL, network, oversize body, decode) is `SourceUnavailable`.
#[tracing::instrument(skip(fetcher, policy))]
pub fn acquire_url(
    fetcher: &dyn ImageFetcher,
    policy: &ImagePolicy,
    raw_url: &str,
) -> ArcraftResult<Acquired> {
    let url = url::Url::parse(raw_url.trim())
        .map_err(|e| ArcraftError::source_unavailable(format!("invalid image url: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ArcraftError::source_unavailable(format!(
            "unsupported url scheme '{}'",
            url.scheme()
        )));
    }

    let fetched = fetcher.fetch(&url, policy.max_bytes).map_err(|e| match e {
        ArcraftError::SourceUnavailable(_) => e,
        other => ArcraftError::source_unavailable(format!("fetch '{url}' failed: {other}")),
    })?;
    let byte_size = fetched.bytes.len() as u64;
    if byte_size > policy.max_bytes {
        return Err(ArcraftError::source_unavailable(format!(
            "remote image is larger than {} bytes",
            policy.max_bytes
        )));
    }

    let raster = decode_image(&fetched.bytes, policy).map_err(|e| {
        ArcraftError::source_unavailable(format!("remote image could not be decoded: {e}"))
    })?;
    tracing::debug!(byte_size, content_type = ?fetched.content_type, "fetched remote image");

    Ok(Acquired {
        raster,
        byte_size,
        origin: ImageOrigin::Url(url.to_string()),
    })
}

/// Blocking HTTP fetcher. The agent keeps no cookie store, so requests are credentialless.
#[cfg(feature = "http-fetch")]
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    agent: ureq::Agent,
}

#[cfg(feature = "http-fetch")]
impl HttpFetcher {
    pub fn new(timeout: std::time::Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .redirects(5)
            .build();
        Self { agent }
    }
}

#[cfg(feature = "http-fetch")]
impl ImageFetcher for HttpFetcher {
    fn fetch(&self, url: &url::Url, max_bytes: u64) -> ArcraftResult<FetchedImage> {
        use std::io::Read as _;

        let resp = self
            .agent
            .get(url.as_str())
            .set("Accept", "image/*")
            .call()
            .map_err(|e| ArcraftError::source_unavailable(format!("GET {url}: {e}")))?;
        let content_type = resp.header("content-type").map(str::to_string);

        let mut bytes = Vec::new();
        resp.into_reader()
            .take(max_bytes.saturating_add(1))
            .read_to_end(&mut bytes)
            .map_err(|e| ArcraftError::source_unavailable(format!("read body of {url}: {e}")))?;

        Ok(FetchedImage {
            bytes,
            content_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    struct StaticFetcher(ArcraftResult<Vec<u8>>);

    impl ImageFetcher for StaticFetcher {
        fn fetch(&self, _url: &url::Url, _max_bytes: u64) -> ArcraftResult<FetchedImage> {
            match &self.0 {
                Ok(bytes) => Ok(FetchedImage {
                    bytes: bytes.clone(),
                    content_type: Some("image/png".to_string()),
                }),
                Err(e) => Err(ArcraftError::validation(e.to_string())),
            }
        }
    }

    fn png() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(2, 2, image::Rgba([5, 6, 7, 255]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn fetch_decodes_into_local_raster() {
        let f = StaticFetcher(Ok(png()));
        let acq = acquire_url(&f, &ImagePolicy::default(), "https://img.test/a.png").unwrap();
        assert_eq!(acq.raster.width, 2);
        assert_eq!(
            acq.origin,
            ImageOrigin::Url("https://img.test/a.png".to_string())
        );
    }

    #[test]
    fn every_failure_is_source_unavailable() {
        let policy = ImagePolicy::default();
        let ok = StaticFetcher(Ok(png()));
        for bad in ["not a url", "ftp://host/a.png", "file:///etc/passwd"] {
            assert!(matches!(
                acquire_url(&ok, &policy, bad),
                Err(ArcraftError::SourceUnavailable(_))
            ));
        }

        let net = StaticFetcher(Err(ArcraftError::validation("connection reset")));
        assert!(matches!(
            acquire_url(&net, &policy, "https://img.test/a.png"),
            Err(ArcraftError::SourceUnavailable(_))
        ));

        let garbage = StaticFetcher(Ok(b"<html>".to_vec()));
        assert!(matches!(
            acquire_url(&garbage, &policy, "https://img.test/a.png"),
            Err(ArcraftError::SourceUnavailable(_))
        ));

        let small = ImagePolicy {
            max_bytes: 4,
            ..ImagePolicy::default()
        };
        assert!(matches!(
            acquire_url(&ok, &small, "https://img.test/a.png"),
            Err(ArcraftError::SourceUnavailable(_))
        ));
    }
}
