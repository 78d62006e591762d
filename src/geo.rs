use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::domain::{GeoAccession, GeoKind};
use crate::error::ProbeError;

const GEO_HOST: &str = "https://ftp.ncbi.nlm.nih.gov";

pub trait GeoClient {
    fn fetch_listing(&self, url: &str) -> Result<String, ProbeError>;
    fn download_url(&self, url: &str, destination: &Path) -> Result<(), ProbeError>;
}

#[derive(Clone)]
pub struct GeoHttpClient {
    client: Client,
}

impl GeoHttpClient {
    pub fn new() -> Result<Self, ProbeError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("expression-probe/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| ProbeError::GeoHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(600))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|err| ProbeError::GeoHttp(err.to_string()))?;
        Ok(Self { client })
    }

    fn get_checked(&self, url: &str) -> Result<reqwest::blocking::Response, ProbeError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| ProbeError::GeoHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "GEO request failed".to_string());
            return Err(ProbeError::GeoStatus { status, message });
        }
        Ok(response)
    }
}

impl GeoClient for GeoHttpClient {
    fn fetch_listing(&self, url: &str) -> Result<String, ProbeError> {
        self.get_checked(url)?
            .text()
            .map_err(|err| ProbeError::GeoHttp(err.to_string()))
    }

    fn download_url(&self, url: &str, destination: &Path) -> Result<(), ProbeError> {
        let mut response = self.get_checked(url)?;
        let dir = destination.parent().unwrap_or_else(|| Path::new("."));
        let mut temp =
            NamedTempFile::new_in(dir).map_err(|err| ProbeError::Filesystem(err.to_string()))?;
        std::io::copy(&mut response, &mut temp)
            .map_err(|err| ProbeError::GeoHttp(err.to_string()))?;
        temp.flush()
            .map_err(|err| ProbeError::Filesystem(err.to_string()))?;
        temp.persist(destination)
            .map_err(|err| ProbeError::Filesystem(err.error.to_string()))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TenxFileKind {
    Barcodes,
    Features,
    Matrix,
}

impl TenxFileKind {
    pub const ALL: [TenxFileKind; 3] = [
        TenxFileKind::Barcodes,
        TenxFileKind::Features,
        TenxFileKind::Matrix,
    ];

    /// Substring identifying this kind in a GEO file name; also the local file name.
    pub fn marker(&self) -> &'static str {
        match self {
            TenxFileKind::Barcodes => "barcodes.tsv.gz",
            TenxFileKind::Features => "features.tsv.gz",
            TenxFileKind::Matrix => "matrix.mtx.gz",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenxSelection {
    pub barcodes: Option<String>,
    pub features: Option<String>,
    pub matrix: Option<String>,
}

impl TenxSelection {
    pub fn get(&self, kind: TenxFileKind) -> Option<&str> {
        match kind {
            TenxFileKind::Barcodes => self.barcodes.as_deref(),
            TenxFileKind::Features => self.features.as_deref(),
            TenxFileKind::Matrix => self.matrix.as_deref(),
        }
    }

    fn slot(&mut self, kind: TenxFileKind) -> &mut Option<String> {
        match kind {
            TenxFileKind::Barcodes => &mut self.barcodes,
            TenxFileKind::Features => &mut self.features,
            TenxFileKind::Matrix => &mut self.matrix,
        }
    }

    pub fn is_complete(&self) -> bool {
        TenxFileKind::ALL.iter().all(|kind| self.get(*kind).is_some())
    }

    pub fn is_empty(&self) -> bool {
        TenxFileKind::ALL.iter().all(|kind| self.get(*kind).is_none())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GeoFileResult {
    pub kind: TenxFileKind,
    pub source: Option<String>,
    pub path: Option<String>,
    pub action: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeoFetchResult {
    pub accession: String,
    pub directory: String,
    pub files: Vec<GeoFileResult>,
}

/// Accession stem plus all but the last three digits plus `nnn`, or `<stem>nnn` when
/// there are three digits or fewer.
pub fn geo_prefix(accession: &GeoAccession) -> String {
    let stem = &accession.as_str()[..3];
    let digits = accession.digits();
    if digits.len() <= 3 {
        return format!("{stem}nnn");
    }
    format!("{stem}{}nnn", &digits[..digits.len() - 3])
}

pub fn suppl_dir_path(accession: &GeoAccession) -> String {
    let group = match accession.kind() {
        GeoKind::Series => "series",
        GeoKind::Sample => "samples",
    };
    format!(
        "/geo/{group}/{prefix}/{acc}/suppl/",
        prefix = geo_prefix(accession),
        acc = accession.as_str()
    )
}

pub fn suppl_url(accession: &GeoAccession) -> String {
    format!("{GEO_HOST}{}", suppl_dir_path(accession))
}

pub fn parse_listing(html: &str) -> Vec<String> {
    let Ok(href) = Regex::new(r#"href="([^"]+)""#) else {
        return Vec::new();
    };
    href.captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Picks the first file of each kind, matching names case-insensitively. A name is
/// assigned to at most one kind, checked in barcodes, features, matrix order.
pub fn select_tenx_files<S: AsRef<str>>(names: &[S]) -> TenxSelection {
    let mut selection = TenxSelection::default();
    for name in names {
        let name = name.as_ref();
        let lower = name.to_lowercase();
        for kind in TenxFileKind::ALL {
            if selection.get(kind).is_none() && lower.contains(kind.marker()) {
                *selection.slot(kind) = Some(name.to_string());
                break;
            }
        }
        if selection.is_complete() {
            break;
        }
    }
    selection
}

/// Downloads the 10x files of a GEO series or sample into `<base_dir>/<accession>/`.
/// Missing kinds and failed downloads are logged and reported, not fatal, unless no
/// file of any kind is listed.
pub fn fetch_tenx_dataset<G: GeoClient>(
    client: &G,
    accession: &GeoAccession,
    base_dir: &Path,
) -> Result<GeoFetchResult, ProbeError> {
    let base_url = suppl_url(accession);
    info!(accession = %accession, url = %base_url, "listing GEO supplementary files");
    let listing = client.fetch_listing(&base_url)?;
    let selection = select_tenx_files(&parse_listing(&listing));
    if selection.is_empty() {
        return Err(ProbeError::GeoFilesNotFound(accession.to_string()));
    }

    let directory: PathBuf = base_dir.join(accession.as_str());
    fs::create_dir_all(&directory).map_err(|err| {
        ProbeError::Filesystem(format!("create {}: {err}", directory.display()))
    })?;

    let mut files = Vec::new();
    for kind in TenxFileKind::ALL {
        let Some(name) = selection.get(kind) else {
            warn!(accession = %accession, kind = kind.marker(), "no file of this kind found");
            files.push(GeoFileResult {
                kind,
                source: None,
                path: None,
                action: "missing".to_string(),
            });
            continue;
        };
        let url = join_url(&base_url, name);
        let destination = directory.join(kind.marker());
        info!(source = %url, destination = %destination.display(), "downloading");
        let action = match client.download_url(&url, &destination) {
            Ok(()) => "downloaded".to_string(),
            Err(err) => {
                warn!(source = %url, error = %err, "download failed");
                "failed".to_string()
            }
        };
        files.push(GeoFileResult {
            kind,
            source: Some(url),
            path: Some(destination.display().to_string()),
            action,
        });
    }

    Ok(GeoFetchResult {
        accession: accession.to_string(),
        directory: directory.display().to_string(),
        files,
    })
}

fn join_url(base: &str, name: &str) -> String {
    if name.starts_with("http://") || name.starts_with("https://") {
        return name.to_string();
    }
    if let Some(absolute) = name.strip_prefix('/') {
        return format!("{GEO_HOST}/{absolute}");
    }
    if base.ends_with('/') {
        format!("{base}{name}")
    } else {
        format!("{base}/{name}")
    }
}
