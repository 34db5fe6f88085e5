// Retrieval of the workbook over HTTP.

use reqwest::blocking::Client;

use crate::report::*;

/// Downloads the workbook.
///
/// Transport errors are retried up to `attempts` times in total. A response
/// with a non-success status is final.
pub fn fetch_workbook(url: &str, timeout: Duration, attempts: u32) -> ReportResult<Vec<u8>> {
    let client = Client::builder()
        .timeout(timeout)
        .build()
        .context(FetchSnafu { url })?;
    let mut attempt: u32 = 1;
    loop {
        info!("Retrieving: {} (attempt {}/{})", url, attempt, attempts);
        match client.get(url).send() {
            Ok(response) => {
                let status = response.status();
                ensure!(
                    status.is_success(),
                    FetchStatusSnafu {
                        url,
                        status: status.as_u16()
                    }
                );
                let bytes = response.bytes().context(FetchSnafu { url })?;
                debug!("fetch_workbook: {} bytes", bytes.len());
                return Ok(bytes.to_vec());
            }
            Err(e) if attempt < attempts => {
                warn!("fetch_workbook: attempt {} failed: {}", attempt, e);
                std::thread::sleep(Duration::from_secs(2 * attempt as u64));
                attempt += 1;
            }
            Err(e) => return Err(e).context(FetchSnafu { url }),
        }
    }
}
