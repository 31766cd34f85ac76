//! Run orchestration: release → index → staging → snapshot.
//!
//! A run resolves the release, and if its snapshot (`src-<timestamp>`)
//! already exists stops right there. Otherwise it loads the index, plans a
//! destination for every package, assembles them concurrently into a
//! private staging directory and publishes it with a single rename. Any
//! hard failure leaves the output directory untouched.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use debgo_schema::{ImportPath, SourcePackage};
use futures::stream::{self, StreamExt};
use thiserror::Error;

use crate::archive::Archive;
use crate::assembler::{AssemblyError, Assembler, Outcome};
use crate::index::{self, IndexError};
use crate::io::download::FetchError;
use crate::paths::{STAGING_PREFIX, snapshot_path};
use crate::reporter::{NullReporter, Reporter};
use crate::tables::PackageTables;
use crate::toolbox::Toolbox;

/// Packages assembled concurrently unless configured otherwise.
pub const DEFAULT_JOBS: usize = 20;

#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("failed to resolve release '{release}': {source}")]
    Release { release: String, source: FetchError },

    #[error("failed to fetch source index: {0}")]
    IndexFetch(FetchError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("task panicked: {0}")]
    Join(String),
}

impl WorkspaceError {
    fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Run phases, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Fetching,
    Assembling,
    Publishing,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fetching => "Fetching release metadata and source index",
            Self::Assembling => "Assembling packages",
            Self::Publishing => "Publishing snapshot",
        })
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// A new snapshot was published.
    Published {
        timestamp: i64,
        path: PathBuf,
        assembled: usize,
        skipped: usize,
    },
    /// The snapshot for this release timestamp already existed.
    Unchanged { timestamp: i64, path: PathBuf },
}

impl RunOutcome {
    /// Release timestamp the snapshot is named after.
    pub fn timestamp(&self) -> i64 {
        match self {
            Self::Published { timestamp, .. } | Self::Unchanged { timestamp, .. } => *timestamp,
        }
    }

    /// Path of the snapshot directory.
    pub fn path(&self) -> &Path {
        match self {
            Self::Published { path, .. } | Self::Unchanged { path, .. } => path,
        }
    }
}

/// Destinations decided before any assembly starts.
#[derive(Debug, Default)]
pub struct Plan {
    pub assemble: Vec<(SourcePackage, ImportPath)>,
    pub skipped: Vec<(SourcePackage, String)>,
}

/// Resolve each package's import path and set aside the ones that have
/// none, an invalid one, one shared with another package, or one nested
/// inside (or containing) another package's destination.
pub fn plan(sources: Vec<SourcePackage>, tables: &PackageTables) -> Plan {
    let mut plan = Plan::default();
    let mut by_path: BTreeMap<ImportPath, Vec<SourcePackage>> = BTreeMap::new();

    for src in sources {
        match tables.import_path(&src) {
            Ok(path) => by_path.entry(path).or_default().push(src),
            Err(e) => plan
                .skipped
                .push((src, format!("missing import path: {e}"))),
        }
    }

    let nesting = nested_paths(&by_path);
    for (path, mut group) in by_path {
        if let Some(reason) = nesting.get(&path) {
            plan.skipped
                .extend(group.into_iter().map(|src| (src, reason.clone())));
            continue;
        }
        if group.len() == 1 {
            if let Some(src) = group.pop() {
                plan.assemble.push((src, path));
            }
            continue;
        }
        let names: Vec<&str> = group.iter().map(|s| s.name.as_str()).collect();
        let reason = format!("import path {path} claimed by {}", names.join(", "));
        plan.skipped
            .extend(group.iter().map(|src| (src.clone(), reason.clone())));
    }

    plan
}

/// Destinations that lie inside another destination, and the ones that
/// contain them, with the skip reason for each.
fn nested_paths(
    by_path: &BTreeMap<ImportPath, Vec<SourcePackage>>,
) -> BTreeMap<ImportPath, String> {
    let owners = |path: &ImportPath| {
        by_path
            .get(path)
            .map(|group| {
                group
                    .iter()
                    .map(|s| s.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default()
    };
    let roots: BTreeMap<&Path, &ImportPath> = by_path
        .keys()
        .map(|p| (Path::new(p.as_str()), p))
        .collect();

    let mut nesting = BTreeMap::new();
    for inner in by_path.keys() {
        for ancestor in Path::new(inner.as_str()).ancestors().skip(1) {
            let Some(&outer) = roots.get(ancestor) else {
                continue;
            };
            nesting.entry(inner.clone()).or_insert_with(|| {
                format!("import path {inner} lies inside {outer} ({})", owners(outer))
            });
            nesting.entry(outer.clone()).or_insert_with(|| {
                format!("import path {outer} contains {inner} ({})", owners(inner))
            });
        }
    }
    nesting
}

/// One release, one output directory.
pub struct Workspace {
    archive: Arc<dyn Archive>,
    tools: Arc<dyn Toolbox>,
    reporter: Arc<dyn Reporter>,
    tables: PackageTables,
    release: String,
    output_dir: PathBuf,
    jobs: usize,
}

impl Workspace {
    pub fn new(
        archive: Arc<dyn Archive>,
        tools: Arc<dyn Toolbox>,
        release: impl Into<String>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            archive,
            tools,
            reporter: Arc::new(NullReporter),
            tables: PackageTables::default(),
            release: release.into(),
            output_dir: output_dir.into(),
            jobs: DEFAULT_JOBS,
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_tables(mut self, tables: PackageTables) -> Self {
        self.tables = tables;
        self
    }

    /// Maximum packages in flight (at least 1).
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Produce (or find) the snapshot of the current release.
    ///
    /// Callers must not run two instances against the same output
    /// directory concurrently.
    pub async fn run(&self) -> Result<RunOutcome, WorkspaceError> {
        let start = Instant::now();

        self.reporter.section(&Phase::Fetching.to_string());
        let release = self
            .archive
            .release(&self.release)
            .await
            .map_err(|source| WorkspaceError::Release {
                release: self.release.clone(),
                source,
            })?;

        let timestamp = release.timestamp;
        let snapshot = snapshot_path(&self.output_dir, timestamp);
        if tokio::fs::try_exists(&snapshot)
            .await
            .map_err(WorkspaceError::io(&snapshot))?
        {
            tracing::info!(timestamp, path = %snapshot.display(), "snapshot is up to date");
            return Ok(RunOutcome::Unchanged {
                timestamp,
                path: snapshot,
            });
        }

        let (index_file, format) = index::select_index(&release)?;
        let index_temp = self
            .archive
            .fetch_to_temp(&index_file)
            .await
            .map_err(WorkspaceError::IndexFetch)?;
        let tables = self.tables.clone();
        let sources = tokio::task::spawn_blocking(move || {
            index::load_index_file(index_temp.path(), format, &tables)
        })
        .await
        .map_err(|e| WorkspaceError::Join(e.to_string()))??;

        let plan = plan(sources, &self.tables);
        for (src, reason) in &plan.skipped {
            self.reporter.skipped(&src.name, &src.version, reason);
        }

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(WorkspaceError::io(&self.output_dir))?;
        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&self.output_dir)
            .map_err(WorkspaceError::io(&self.output_dir))?;
        make_readable(staging.path())?;

        self.reporter.section(&Phase::Assembling.to_string());
        let assembler = Assembler::new(
            Arc::clone(&self.archive),
            Arc::clone(&self.tools),
            Arc::clone(&self.reporter),
            staging.path().to_path_buf(),
        );

        // Every package runs to completion; results arrive in completion order.
        let results: Vec<Result<Outcome, AssemblyError>> = stream::iter(plan.assemble)
            .map(|(src, path)| {
                let assembler = assembler.clone();
                async move { assembler.assemble(&src, &path).await }
            })
            .buffer_unordered(self.jobs)
            .collect()
            .await;

        let mut assembled = 0;
        let mut skipped = plan.skipped.len();
        let mut first_error = None;
        for result in results {
            match result {
                Ok(Outcome::Assembled { .. }) => assembled += 1,
                Ok(Outcome::Skipped { .. }) => skipped += 1,
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }
        if let Some(e) = first_error {
            // Dropping `staging` removes the partial tree.
            return Err(e.into());
        }

        self.reporter.section(&Phase::Publishing.to_string());
        tokio::fs::rename(staging.path(), &snapshot)
            .await
            .map_err(WorkspaceError::io(&snapshot))?;
        let _ = staging.keep();

        self.reporter
            .summary(assembled, skipped, start.elapsed().as_secs_f64());
        Ok(RunOutcome::Published {
            timestamp,
            path: snapshot,
            assembled,
            skipped,
        })
    }
}

#[cfg(unix)]
fn make_readable(dir: &Path) -> Result<(), WorkspaceError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o755))
        .map_err(WorkspaceError::io(dir))
}

#[cfg(not(unix))]
fn make_readable(_dir: &Path) -> Result<(), WorkspaceError> {
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::archive::ReleaseMetadata;
    use crate::toolbox::{ToolError, normalize_tree};
    use async_trait::async_trait;
    use debgo_schema::{FileHash, Sha256Hash};
    use flate2::Compression;
    use flate2::read::GzDecoder;
    use flate2::write::GzEncoder;
    use sha2::{Digest, Sha256};
    use std::collections::HashMap;
    use std::fs::{self, File};
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    const RELEASE: &str = "sid";
    const TIMESTAMP: i64 = 1_700_000_000;

    fn tarball(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        for (path, body) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(body.len() as u64);
            header.set_mode(0o600);
            builder.append_data(&mut header, path, body.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    fn sha256(data: &[u8]) -> String {
        hex::encode(Sha256::digest(data))
    }

    /// In-memory mirror content.
    #[derive(Default)]
    struct Mirror {
        files: HashMap<String, Vec<u8>>,
        sources: String,
    }

    impl Mirror {
        fn package(
            &mut self,
            name: &str,
            extra_fields: &str,
            orig: Option<&[(&str, &str)]>,
            debian: Option<&[(&str, &str)]>,
        ) -> &mut Self {
            let directory = format!("pool/main/g/{name}");
            let mut checksums = String::new();
            for (file, entries) in [
                (format!("{name}_1.0.orig.tar.gz"), orig),
                (format!("{name}_1.0-1.debian.tar.gz"), debian),
            ] {
                let Some(entries) = entries else { continue };
                let data = tarball(entries);
                checksums.push_str(&format!("\n {} {} {file}", sha256(&data), data.len()));
                self.files.insert(format!("{directory}/{file}"), data);
            }
            if !self.sources.is_empty() {
                self.sources.push('\n');
            }
            self.sources.push_str(&format!(
                "Package: {name}\nVersion: 1.0-1\nDirectory: {directory}\n\
                 Build-Depends: debhelper-compat (= 13), golang-any\n\
                 {extra_fields}Checksums-Sha256:{checksums}\n"
            ));
            self
        }

        fn archive(&self) -> Arc<FakeArchive> {
            self.slow_archive(Duration::ZERO)
        }

        /// Every fetch waits `delay` before answering.
        fn slow_archive(&self, delay: Duration) -> Arc<FakeArchive> {
            let mut files = self.files.clone();
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(self.sources.as_bytes()).unwrap();
            files.insert(
                format!("dists/{RELEASE}/{}", index::SOURCES_GZ),
                encoder.finish().unwrap(),
            );
            Arc::new(FakeArchive::new(files, delay))
        }
    }

    struct FakeArchive {
        files: HashMap<String, Vec<u8>>,
        delay: Duration,
        fetches: AtomicUsize,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl FakeArchive {
        fn new(files: HashMap<String, Vec<u8>>, delay: Duration) -> Self {
            Self {
                files,
                delay,
                fetches: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }

        fn read(&self, file: &FileHash) -> Result<NamedTempFile, FetchError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let data = self.files.get(&file.filename).ok_or_else(|| {
                FetchError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    file.filename.clone(),
                ))
            })?;
            let mut temp = NamedTempFile::new()?;
            temp.write_all(data)?;
            Ok(temp)
        }
    }

    #[async_trait]
    impl Archive for FakeArchive {
        async fn release(&self, name: &str) -> Result<ReleaseMetadata, FetchError> {
            let mut indices = HashMap::new();
            let filename = format!("dists/{name}/{}", index::SOURCES_GZ);
            if let Some(data) = self.files.get(&filename) {
                indices.insert(
                    index::SOURCES_GZ.to_string(),
                    FileHash {
                        filename,
                        size: data.len() as u64,
                        sha256: Sha256Hash::new(sha256(data)),
                    },
                );
            }
            Ok(ReleaseMetadata {
                name: name.to_string(),
                timestamp: TIMESTAMP,
                indices,
            })
        }

        async fn fetch_to_temp(&self, file: &FileHash) -> Result<NamedTempFile, FetchError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let result = self.read(file);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }

    /// Extracts with the `tar` crate and records patch and permission
    /// invocations.
    #[derive(Default)]
    struct FakeTools {
        patched: Mutex<Vec<PathBuf>>,
        normalized: Mutex<Vec<PathBuf>>,
        panic_on_patch: bool,
    }

    impl FakeTools {
        fn open(archive: &Path) -> Result<tar::Archive<GzDecoder<File>>, ToolError> {
            let file = File::open(archive).map_err(ToolError::io(archive))?;
            Ok(tar::Archive::new(GzDecoder::new(file)))
        }
    }

    impl Toolbox for FakeTools {
        fn list_archive(&self, archive: &Path) -> Result<Vec<String>, ToolError> {
            let mut tar = Self::open(archive)?;
            let mut members = Vec::new();
            for entry in tar.entries().map_err(ToolError::io(archive))? {
                let entry = entry.map_err(ToolError::io(archive))?;
                let path = entry.path().map_err(ToolError::io(archive))?;
                members.push(path.to_string_lossy().into_owned());
            }
            Ok(members)
        }

        fn extract_archive(
            &self,
            archive: &Path,
            dest: &Path,
            strip: usize,
        ) -> Result<(), ToolError> {
            let mut tar = Self::open(archive)?;
            for entry in tar.entries().map_err(ToolError::io(archive))? {
                let mut entry = entry.map_err(ToolError::io(archive))?;
                let path = entry.path().map_err(ToolError::io(archive))?;
                let rel: PathBuf = path.components().skip(strip).collect();
                if rel.as_os_str().is_empty() {
                    continue;
                }
                let out = dest.join(rel);
                if let Some(parent) = out.parent() {
                    fs::create_dir_all(parent).map_err(ToolError::io(parent))?;
                }
                entry.unpack(&out).map_err(ToolError::io(&out))?;
            }
            Ok(())
        }

        fn apply_patch_series(
            &self,
            source_dir: &Path,
            patches_dir: &Path,
        ) -> Result<(), ToolError> {
            assert!(patches_dir.ends_with("packaging/patches"));
            assert!(!self.panic_on_patch, "patch tool crashed");
            self.patched.lock().unwrap().push(source_dir.to_path_buf());
            Ok(())
        }

        fn normalize_permissions(&self, dir: &Path) -> Result<(), ToolError> {
            self.normalized.lock().unwrap().push(dir.to_path_buf());
            normalize_tree(dir)
        }
    }

    fn foo(mirror: &mut Mirror) -> &mut Mirror {
        mirror.package(
            "golang-example-foo",
            "Go-Import-Path: example.com/foo\n",
            Some(&[
                ("foo-1.0/main.go", "package foo\n"),
                ("foo-1.0/generated.txt", "stale\n"),
            ]),
            Some(&[
                ("debian/control", "Source: golang-example-foo\n"),
                (
                    "debian/golang-example-foo-dev.links",
                    "usr/share/gocode/src/example.com/foo usr/share/gocode/src/example.com/foo-alias\n",
                ),
                ("debian/clean", "generated.txt\n"),
                ("debian/patches/series", "# fixes\n01-fix.patch\n"),
                ("debian/patches/01-fix.patch", "--- a/main.go\n"),
            ]),
        )
    }

    fn bar(mirror: &mut Mirror) -> &mut Mirror {
        mirror.package(
            "golang-example-bar",
            "Go-Import-Path: example.com/bar\n",
            Some(&[("bar-2.0/bar.go", "package bar\n")]),
            Some(&[
                ("debian/control", "Source: golang-example-bar\n"),
                ("debian/patches/series", "# none yet\n"),
            ]),
        )
    }

    fn leftovers(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    #[tokio::test]
    async fn publishes_snapshot_and_is_idempotent() {
        let mut mirror = Mirror::default();
        bar(foo(&mut mirror));
        let archive = mirror.archive();
        let tools = Arc::new(FakeTools::default());
        let out = tempfile::tempdir().unwrap();

        let workspace = Workspace::new(archive.clone(), tools.clone(), RELEASE, out.path());
        let first = workspace.run().await.unwrap();
        assert_eq!(first.timestamp(), TIMESTAMP);
        assert!(matches!(
            first,
            RunOutcome::Published {
                assembled: 2,
                skipped: 0,
                ..
            }
        ));

        let root = out.path().join(format!("src-{TIMESTAMP}"));
        let foo = root.join("example.com/foo");
        assert_eq!(
            fs::read_to_string(foo.join("main.go")).unwrap(),
            "package foo\n"
        );
        assert!(!foo.join("generated.txt").exists());
        assert!(foo.join("packaging/control").exists());
        assert!(root.join("example.com/bar/bar.go").exists());
        assert_eq!(
            fs::read_link(root.join("example.com/foo-alias")).unwrap(),
            PathBuf::from("foo")
        );

        let hashes = fs::read_to_string(foo.join("packaging/.hashes")).unwrap();
        let lines: Vec<&str> = hashes.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with(
            "pool/main/g/golang-example-foo/golang-example-foo_1.0.orig.tar.gz="
        ));
        assert!(lines[1].contains(".debian.tar.gz="));

        // Only the package with a non-empty series was patched, inside staging.
        let patched = tools.patched.lock().unwrap().clone();
        assert_eq!(patched.len(), 1);
        assert!(patched[0].ends_with("example.com/foo"));
        assert!(
            patched[0]
                .to_string_lossy()
                .contains(&format!("/{STAGING_PREFIX}"))
        );

        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(&root).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o755);
        let mode = fs::metadata(root.join("example.com")).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o755);
        let mode = fs::metadata(foo.join("main.go")).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);

        let fetches = archive.fetches.load(Ordering::SeqCst);
        let second = workspace.run().await.unwrap();
        assert_eq!(
            second,
            RunOutcome::Unchanged {
                timestamp: TIMESTAMP,
                path: root.clone(),
            }
        );
        assert_eq!(archive.fetches.load(Ordering::SeqCst), fetches);
        assert_eq!(leftovers(out.path()), vec![format!("src-{TIMESTAMP}")]);
    }

    #[tokio::test]
    async fn hard_failure_prevents_publication() {
        let mut mirror = Mirror::default();
        bar(foo(&mut mirror));
        mirror
            .files
            .remove("pool/main/g/golang-example-bar/golang-example-bar_1.0.orig.tar.gz");
        let archive = mirror.archive();
        let tools = Arc::new(FakeTools::default());
        let out = tempfile::tempdir().unwrap();

        // bar is planned first; foo must still run to completion.
        let workspace = Workspace::new(archive.clone(), tools.clone(), RELEASE, out.path())
            .with_jobs(1);
        let err = workspace.run().await.unwrap_err();
        match err {
            WorkspaceError::Assembly(e) => {
                assert_eq!(e.package, "golang-example-bar");
                assert_eq!(e.step, crate::assembler::Step::Fetch);
            }
            other => panic!("unexpected error: {other}"),
        }

        // index + bar's orig + both of foo's tarballs
        assert_eq!(archive.fetches.load(Ordering::SeqCst), 4);
        let normalized = tools.normalized.lock().unwrap().clone();
        assert_eq!(normalized.len(), 1);
        assert!(normalized[0].ends_with("example.com/foo"));
        assert!(leftovers(out.path()).is_empty());
    }

    #[tokio::test]
    async fn concurrency_is_bounded_by_jobs() {
        let mut mirror = Mirror::default();
        for i in 0..6 {
            mirror.package(
                &format!("golang-example-p{i}"),
                &format!("Go-Import-Path: example.com/p{i}\n"),
                Some(&[("p-1.0/p.go", "package p\n")]),
                Some(&[("debian/control", "")]),
            );
        }
        let archive = mirror.slow_archive(Duration::from_millis(20));
        let out = tempfile::tempdir().unwrap();

        let outcome = Workspace::new(
            archive.clone(),
            Arc::new(FakeTools::default()),
            RELEASE,
            out.path(),
        )
        .with_jobs(2)
        .run()
        .await
        .unwrap();

        assert!(matches!(
            outcome,
            RunOutcome::Published {
                assembled: 6,
                skipped: 0,
                ..
            }
        ));
        assert_eq!(archive.peak.load(Ordering::SeqCst), 2);
        assert_eq!(archive.fetches.load(Ordering::SeqCst), 13);
    }

    #[tokio::test]
    async fn nested_destinations_are_skipped() {
        let mut mirror = Mirror::default();
        bar(&mut mirror)
            .package(
                "golang-example-outer",
                "Go-Import-Path: example.com/foo\n",
                Some(&[
                    ("foo-1.0/main.go", "package foo\n"),
                    ("foo-1.0/sub/keep.go", "package sub\n"),
                ]),
                Some(&[("debian/control", "")]),
            )
            .package(
                "golang-example-inner",
                "Go-Import-Path: example.com/foo/sub\n",
                Some(&[("sub-1.0/sub.go", "package sub\n")]),
                Some(&[("debian/control", ""), ("debian/clean", "keep.go\n")]),
            );
        let tools = Arc::new(FakeTools::default());
        let out = tempfile::tempdir().unwrap();

        let outcome = Workspace::new(mirror.archive(), tools.clone(), RELEASE, out.path())
            .with_jobs(1)
            .run()
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            RunOutcome::Published {
                assembled: 1,
                skipped: 2,
                ..
            }
        ));
        let root = outcome.path();
        assert!(root.join("example.com/bar/bar.go").exists());
        assert!(!root.join("example.com/foo").exists());
        assert_eq!(tools.normalized.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn panic_is_charged_to_the_running_step() {
        let mut mirror = Mirror::default();
        foo(&mut mirror);
        let tools = Arc::new(FakeTools {
            panic_on_patch: true,
            ..FakeTools::default()
        });
        let out = tempfile::tempdir().unwrap();

        let err = Workspace::new(mirror.archive(), tools, RELEASE, out.path())
            .run()
            .await
            .unwrap_err();
        match err {
            WorkspaceError::Assembly(e) => {
                assert_eq!(e.step, crate::assembler::Step::Patch);
                assert!(matches!(e.source, crate::assembler::StepError::Join(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(leftovers(out.path()).is_empty());
    }

    #[tokio::test]
    async fn soft_failures_are_skipped() {
        let mut mirror = Mirror::default();
        bar(&mut mirror);
        mirror
            .package(
                "golang-no-debian",
                "Go-Import-Path: example.com/nodebian\n",
                Some(&[("x/x.go", "package x\n")]),
                None,
            )
            .package(
                "golang-no-path",
                "",
                Some(&[("y/y.go", "package y\n")]),
                Some(&[("debian/control", "")]),
            )
            .package(
                "golang-dup-one",
                "Go-Import-Path: example.com/dup\n",
                Some(&[("d/d.go", "package d\n")]),
                Some(&[("debian/control", "")]),
            )
            .package(
                "golang-dup-two",
                "Go-Import-Path: example.com/dup\n",
                Some(&[("d/d.go", "package d\n")]),
                Some(&[("debian/control", "")]),
            );
        let out = tempfile::tempdir().unwrap();

        let outcome = Workspace::new(
            mirror.archive(),
            Arc::new(FakeTools::default()),
            RELEASE,
            out.path(),
        )
        .with_jobs(2)
        .run()
        .await
        .unwrap();

        assert!(matches!(
            outcome,
            RunOutcome::Published {
                assembled: 1,
                skipped: 4,
                ..
            }
        ));
        let root = outcome.path();
        assert!(root.join("example.com/bar").exists());
        assert!(!root.join("example.com/dup").exists());
        assert!(!root.join("example.com/nodebian").exists());
    }

    #[tokio::test]
    async fn missing_index_is_fatal() {
        let archive = Arc::new(FakeArchive::new(HashMap::new(), Duration::ZERO));
        let out = tempfile::tempdir().unwrap();
        let err = Workspace::new(archive, Arc::new(FakeTools::default()), RELEASE, out.path())
            .run()
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WorkspaceError::Index(IndexError::Missing { .. })
        ));
        assert!(leftovers(out.path()).is_empty());
    }

    #[test]
    fn plan_rejects_nested_destinations() {
        let text = "Package: outer\nVersion: 1\nDirectory: d\nGo-Import-Path: x.com/a\n\n\
                    Package: inner\nVersion: 1\nDirectory: d\nGo-Import-Path: x.com/a/b/c\n\n\
                    Package: sibling\nVersion: 1\nDirectory: d\nGo-Import-Path: x.com/a-b\n\n\
                    Package: prefix\nVersion: 1\nDirectory: d\nGo-Import-Path: x.com/ab\n";
        let tables = PackageTables::default();
        let sources = index::load_sources(text.as_bytes(), &tables).unwrap();
        let plan = plan(sources, &tables);

        let mut planned: Vec<&str> = plan.assemble.iter().map(|(_, p)| p.as_str()).collect();
        planned.sort_unstable();
        assert_eq!(planned, ["x.com/a-b", "x.com/ab"]);

        let reasons: BTreeMap<&str, &str> = plan
            .skipped
            .iter()
            .map(|(s, r)| (s.name.as_str(), r.as_str()))
            .collect();
        assert_eq!(reasons.len(), 2);
        assert!(reasons["inner"].contains("inside x.com/a (outer)"));
        assert!(reasons["outer"].contains("contains x.com/a/b/c (inner)"));
    }

    #[test]
    fn plan_rejects_collisions_and_missing_paths() {
        let text = "Package: a\nVersion: 1\nDirectory: d\nGo-Import-Path: x.com/same\n\n\
                    Package: b\nVersion: 1\nDirectory: d\nGo-Import-Path: x.com/same\n\n\
                    Package: c\nVersion: 1\nDirectory: d\nBuild-Depends: golang-go\n\n\
                    Package: pluginhook\nVersion: 1\nDirectory: d\nBuild-Depends: golang-go\n";
        let tables = PackageTables::default();
        let sources = index::load_sources(text.as_bytes(), &tables).unwrap();
        let plan = plan(sources, &tables);

        let planned: Vec<(&str, &str)> = plan
            .assemble
            .iter()
            .map(|(s, p)| (s.name.as_str(), p.as_str()))
            .collect();
        assert_eq!(planned, [("pluginhook", "github.com/progrium/pluginhook")]);

        let mut skipped: Vec<&str> = plan.skipped.iter().map(|(s, _)| s.name.as_str()).collect();
        skipped.sort_unstable();
        assert_eq!(skipped, ["a", "b", "c"]);
    }
}
