//! Detection of the Google Cloud compute platform, for `onGCE` values.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::blocking::Client;
use tracing::debug;

/// Answers whether the process runs on the target cloud platform.
pub trait Platform {
    fn on_gce(&self) -> bool;
}

/// A fixed answer.
impl Platform for bool {
    fn on_gce(&self) -> bool {
        *self
    }
}

impl<P: Platform + ?Sized> Platform for Box<P> {
    fn on_gce(&self) -> bool {
        (**self).on_gce()
    }
}

/// Environment variable that names an explicit metadata server.
pub const METADATA_HOST_ENV: &str = "GCE_METADATA_HOST";

const METADATA_ADDR: ([u8; 4], u16) = ([169, 254, 169, 254], 80);
const METADATA_FLAVOR: &str = "Metadata-Flavor";
const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);
const PRODUCT_NAME_PATH: &str = "/sys/class/dmi/id/product_name";

/// Probes the local machine and the metadata server.
///
/// The server probe uses a blocking HTTP client and must not run on an async
/// runtime thread; async callers pass their own [`Platform`] instead.
#[derive(Debug, Clone)]
pub struct MetadataProbe {
    addr: SocketAddr,
    connect_timeout: Duration,
    io_timeout: Duration,
    product_name_path: PathBuf,
}

impl Default for MetadataProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataProbe {
    pub fn new() -> Self {
        Self {
            addr: SocketAddr::from(METADATA_ADDR),
            connect_timeout: DEFAULT_TIMEOUT,
            io_timeout: DEFAULT_TIMEOUT,
            product_name_path: PathBuf::from(PRODUCT_NAME_PATH),
        }
    }

    /// Sets both the connect and the read/write timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self.io_timeout = timeout;
        self
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    fn product_name_matches(&self) -> bool {
        std::fs::read_to_string(&self.product_name_path)
            .map(|name| matches!(name.trim(), "Google" | "Google Compute Engine"))
            .unwrap_or(false)
    }

    pub(crate) fn probe_metadata_server(&self) -> reqwest::Result<bool> {
        let client = Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.io_timeout)
            .no_proxy()
            .build()?;
        let resp = client
            .get(format!("http://{}/", self.addr))
            .header(METADATA_FLAVOR, "Google")
            .send()?;
        Ok(resp
            .headers()
            .get(METADATA_FLAVOR)
            .is_some_and(|value| value.as_bytes() == b"Google"))
    }
}

impl Platform for MetadataProbe {
    fn on_gce(&self) -> bool {
        if std::env::var_os(METADATA_HOST_ENV).is_some() {
            return true;
        }
        if self.product_name_matches() {
            return true;
        }
        match self.probe_metadata_server() {
            Ok(found) => found,
            Err(err) => {
                debug!(%err, addr = %self.addr, "metadata server probe failed");
                false
            }
        }
    }
}
