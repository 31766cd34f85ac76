//! Per-package assembly.
//!
//! Each selected source package goes through a fixed sequence of steps:
//! select its two tarballs, fetch them, unpack upstream sources into
//! `<staging>/<import path>` and packaging metadata into `packaging/`
//! beneath it, apply the patch series, materialize `links`, honour `clean`,
//! normalize permissions and record the tarball hashes.
//!
//! Problems that only mean "this package is not usable" are soft and
//! produce [`Outcome::Skipped`]; anything else is an [`AssemblyError`] that
//! fails the run.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use debgo_schema::{DebVersion, FileHash, ImportPath, PackageName, SourcePackage};
use thiserror::Error;

use crate::archive::Archive;
use crate::debhelper;
use crate::io::download::FetchError;
use crate::io::extract::unpack;
use crate::paths::{HASHES_FILE, packaging_path};
use crate::reporter::Reporter;
use crate::toolbox::{ToolError, Toolbox};

/// Assembly step, for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Fetch,
    Extract,
    Patch,
    Links,
    Clean,
    Permissions,
    Provenance,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Fetch => "fetch",
            Self::Extract => "extract",
            Self::Patch => "patch",
            Self::Links => "links",
            Self::Clean => "clean",
            Self::Permissions => "permissions",
            Self::Provenance => "provenance",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum StepError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("task panicked: {0}")]
    Join(String),
}

/// A hard per-package failure.
#[derive(Error, Debug)]
#[error("src:{package} {version}: {step} failed: {source}")]
pub struct AssemblyError {
    pub package: PackageName,
    pub version: DebVersion,
    pub step: Step,
    #[source]
    pub source: StepError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Assembled { import_path: ImportPath },
    Skipped { reason: String },
}

/// The upstream and packaging tarballs of a source package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tarballs {
    pub orig: FileHash,
    pub debian: FileHash,
}

/// Pick the `.orig.tar.*` and `.debian.tar.*` artifacts, ignoring
/// signatures. Returns the skip reason when either is missing.
pub fn select_tarballs(artifacts: &[FileHash]) -> Result<Tarballs, String> {
    let candidates = || {
        artifacts
            .iter()
            .filter(|a| !a.filename.ends_with(".asc"))
    };
    let orig = candidates().find(|a| a.filename.contains(".orig.tar."));
    let debian = candidates().find(|a| a.filename.contains(".debian.tar."));

    match (orig, debian) {
        (Some(orig), Some(debian)) => Ok(Tarballs {
            orig: orig.clone(),
            debian: debian.clone(),
        }),
        (None, _) => Err("no .orig.tar.* artifact".to_string()),
        (_, None) => Err("no .debian.tar.* artifact".to_string()),
    }
}

/// Whether a quilt series lists at least one patch.
pub fn series_has_entries(series: &Path) -> Result<bool, ToolError> {
    match fs::read_to_string(series) {
        Ok(text) => Ok(text
            .lines()
            .map(str::trim)
            .any(|l| !l.is_empty() && !l.starts_with('#'))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(ToolError::io(series)(e)),
    }
}

/// Lays out packages under one staging root.
#[derive(Clone)]
pub struct Assembler {
    archive: Arc<dyn Archive>,
    tools: Arc<dyn Toolbox>,
    reporter: Arc<dyn Reporter>,
    staging: PathBuf,
}

impl Assembler {
    pub fn new(
        archive: Arc<dyn Archive>,
        tools: Arc<dyn Toolbox>,
        reporter: Arc<dyn Reporter>,
        staging: PathBuf,
    ) -> Self {
        Self {
            archive,
            tools,
            reporter,
            staging,
        }
    }

    /// Assemble `src` into `<staging>/<import_path>`.
    pub async fn assemble(
        &self,
        src: &SourcePackage,
        import_path: &ImportPath,
    ) -> Result<Outcome, AssemblyError> {
        let fail = |step: Step, source: StepError| {
            self.reporter
                .failed(&src.name, &src.version, &format!("{step}: {source}"));
            AssemblyError {
                package: src.name.clone(),
                version: src.version.clone(),
                step,
                source,
            }
        };

        let tarballs = match select_tarballs(&src.artifacts) {
            Ok(t) => Tarballs {
                orig: t.orig.joined(&src.directory),
                debian: t.debian.joined(&src.directory),
            },
            Err(reason) => {
                self.reporter.skipped(&src.name, &src.version, &reason);
                return Ok(Outcome::Skipped { reason });
            }
        };

        self.reporter
            .fetching(&src.name, &src.version, tarballs.orig.basename());
        let orig = self
            .archive
            .fetch_to_temp(&tarballs.orig)
            .await
            .map_err(|e| fail(Step::Fetch, e.into()))?;
        self.reporter
            .fetching(&src.name, &src.version, tarballs.debian.basename());
        let debian = self
            .archive
            .fetch_to_temp(&tarballs.debian)
            .await
            .map_err(|e| fail(Step::Fetch, e.into()))?;

        let current = Arc::new(Mutex::new(Step::Extract));
        let layout = Layout {
            tools: Arc::clone(&self.tools),
            current: Arc::clone(&current),
            reporter: Arc::clone(&self.reporter),
            name: src.name.clone(),
            version: src.version.clone(),
            staging: self.staging.clone(),
            dest: self.staging.join(import_path),
            tarballs,
        };

        // The temporaries live until the blocking work is done.
        let result = tokio::task::spawn_blocking(move || {
            let result = layout.run(orig.path(), debian.path());
            drop((orig, debian));
            result
        })
        .await;

        match result {
            Ok(Ok(())) => {
                self.reporter
                    .done(&src.name, &src.version, import_path.as_str());
                Ok(Outcome::Assembled {
                    import_path: import_path.clone(),
                })
            }
            Ok(Err((step, e))) => Err(fail(step, e.into())),
            Err(e) => {
                // A panic is charged to the step that was running.
                let step = current.lock().map_or(Step::Extract, |s| *s);
                Err(fail(step, StepError::Join(e.to_string())))
            }
        }
    }
}

/// Blocking filesystem half of an assembly.
struct Layout {
    tools: Arc<dyn Toolbox>,
    current: Arc<Mutex<Step>>,
    reporter: Arc<dyn Reporter>,
    name: PackageName,
    version: DebVersion,
    staging: PathBuf,
    dest: PathBuf,
    tarballs: Tarballs,
}

impl Layout {
    fn run(&self, orig: &Path, debian: &Path) -> Result<(), (Step, ToolError)> {
        let packaging = packaging_path(&self.dest);
        let tools = self.tools.as_ref();

        self.step(Step::Extract, || {
            unpack(tools, orig, &self.dest)?;
            unpack(tools, debian, &packaging)
        })?;

        self.step(Step::Patch, || {
            let patches = packaging.join("patches");
            if series_has_entries(&patches.join("series"))? {
                tools.apply_patch_series(&self.dest, &patches)?;
            }
            Ok(())
        })?;

        self.step(Step::Links, || {
            debhelper::apply_links(&packaging, &self.staging).map(drop)
        })?;
        self.step(Step::Clean, || {
            debhelper::apply_clean(&packaging, &self.dest).map(drop)
        })?;
        self.step(Step::Permissions, || tools.normalize_permissions(&self.dest))?;

        self.step(Step::Provenance, || {
            let path = packaging.join(HASHES_FILE);
            let manifest = format!(
                "{}={}\n{}={}\n",
                self.tarballs.orig.filename,
                self.tarballs.orig.sha256,
                self.tarballs.debian.filename,
                self.tarballs.debian.sha256,
            );
            fs::write(&path, manifest).map_err(ToolError::io(&path))
        })
    }

    fn step(
        &self,
        step: Step,
        f: impl FnOnce() -> Result<(), ToolError>,
    ) -> Result<(), (Step, ToolError)> {
        if let Ok(mut current) = self.current.lock() {
            *current = step;
        }
        self.reporter
            .step(&self.name, &self.version, &step.to_string());
        f().map_err(|e| (step, e))
    }
}
