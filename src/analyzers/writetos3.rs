use aws_sdk_s3::primitives::ByteStream;
use tracing::info;

use crate::error::{PublishSnafu, Result};

/// Uploads an encoded report to S3.
///
/// `gzip` marks the object with `Content-Encoding: gzip` so browsers and the
/// dashboard front end decode it transparently.
#[tracing::instrument(skip(client, body), fields(bytes = body.len()))]
pub async fn publish_report(
    client: &aws_sdk_s3::Client,
    bucket: &str,
    key: &str,
    body: Vec<u8>,
    gzip: bool,
) -> Result<()> {
    let mut request = client
        .put_object()
        .bucket(bucket)
        .key(key)
        .body(ByteStream::from(body))
        .content_type("application/json");
    if gzip {
        request = request.content_encoding("gzip");
    }

    request.send().await.map_err(|e| {
        PublishSnafu {
            bucket,
            key,
            message: e.to_string(),
        }
        .build()
    })?;

    info!(bucket, key, "Report published");
    Ok(())
}

/// Object key for a report: `reports/<tracking>/<username>/<timestamp>.json[.gz]`.
pub fn report_key(tracking: &str, username: &str, stamp: &str, gzip: bool) -> String {
    let ext = if gzip { "json.gz" } else { "json" };
    format!("reports/{tracking}/{username}/{stamp}.{ext}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_key() {
        assert_eq!(
            report_key("conteo_rapido", "guayas", "20260101T000000Z", true),
            "reports/conteo_rapido/guayas/20260101T000000Z.json.gz"
        );
        assert_eq!(
            report_key("control_electoral", "admin", "x", false),
            "reports/control_electoral/admin/x.json"
        );
    }
}
