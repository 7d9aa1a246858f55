//! Dependency reference resolution
//!
//! Turns declared [`DependencySpec`]s into loadable [`CompilationReference`]s.
//! Output is ordered by first appearance and free of duplicate paths.
//! Resolution is all-or-nothing: one bad spec fails the whole batch.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use parking_lot::Mutex;
use tracing::debug;
use crate::error::{ErrorKind, ScriptError};
use crate::unit::CompilationReference;

/// Environment variable naming the local package root.
pub const PACKAGE_ROOT_ENV: &str = "EMX_SCRIPT_PACKAGES";

/// File every package version directory must contain.
pub const PACKAGE_ENTRY: &str = "lib.emxs";

/// A declared dependency
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DependencySpec {
    /// A script file, relative to the unit's working directory
    File(PathBuf),
    /// A named, versioned package
    Package { name: String, version: String },
}

impl DependencySpec {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        DependencySpec::File(path.into())
    }

    pub fn package(name: impl Into<String>, version: impl Into<String>) -> Self {
        DependencySpec::Package {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Parse `NAME@VERSION`, as given on the command line.
    pub fn parse_package(s: &str) -> Option<Self> {
        let (name, version) = s.split_once('@')?;
        if name.is_empty() || version.is_empty() {
            return None;
        }
        Some(Self::package(name, version))
    }
}

impl fmt::Display for DependencySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencySpec::File(path) => write!(f, "{}", path.display()),
            DependencySpec::Package { name, version } => write!(f, "pkg:{}@{}", name, version),
        }
    }
}

/// A spec that could not be resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionError {
    pub spec: DependencySpec,
    pub cause: String,
}

impl fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Could not resolve '{}': {}", self.spec, self.cause)
    }
}

impl std::error::Error for ResolutionError {}

impl From<ResolutionError> for ScriptError {
    fn from(e: ResolutionError) -> Self {
        ScriptError::new(ErrorKind::Resolution, e.to_string())
    }
}

/// Where packages come from
pub trait PackageSource: Send + Sync {
    /// Return the local path of the package's entry file.
    fn fetch(&self, name: &str, version: &str) -> Result<PathBuf, String>;
}

/// Packages laid out as `<root>/<name lowercased>/<version>/lib.emxs`
#[derive(Debug, Clone)]
pub struct LocalPackageSource {
    root: PathBuf,
}

impl LocalPackageSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root taken from `EMX_SCRIPT_PACKAGES`, else `./packages`.
    pub fn from_env() -> Self {
        let root = std::env::var_os(PACKAGE_ROOT_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("packages"));
        Self::new(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn is_plain_segment(s: &str) -> bool {
    !s.is_empty() && s != "." && s != ".." && !s.contains(['/', '\\'])
}

impl PackageSource for LocalPackageSource {
    fn fetch(&self, name: &str, version: &str) -> Result<PathBuf, String> {
        if !is_plain_segment(name) || !is_plain_segment(version) {
            return Err("package name and version must be plain identifiers".to_string());
        }
        let path = self.root
            .join(name.to_lowercase())
            .join(version)
            .join(PACKAGE_ENTRY);
        if path.is_file() {
            Ok(path)
        } else {
            Err(format!("package not found at {}", path.display()))
        }
    }
}

/// Resolves specs, memoizing package lookups
pub struct Resolver {
    source: Arc<dyn PackageSource>,
    packages: Mutex<HashMap<(String, String), PathBuf>>,
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("memoized", &self.packages.lock().len())
            .finish()
    }
}

impl Resolver {
    pub fn new(source: Arc<dyn PackageSource>) -> Self {
        Self {
            source,
            packages: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve `specs` against `working_directory`.
    pub fn resolve(
        &self,
        specs: &[DependencySpec],
        working_directory: &Path,
    ) -> Result<Vec<CompilationReference>, ResolutionError> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();

        for spec in specs {
            let path = self.resolve_one(spec, working_directory)
                .map_err(|cause| ResolutionError { spec: spec.clone(), cause })?;
            if seen.insert(path.clone()) {
                out.push(CompilationReference::from_path(path));
            }
        }

        debug!(specs = specs.len(), resolved = out.len(), "resolved dependencies");
        Ok(out)
    }

    fn resolve_one(&self, spec: &DependencySpec, working_directory: &Path) -> Result<PathBuf, String> {
        match spec {
            DependencySpec::File(path) => canonical(&working_directory.join(path)),
            DependencySpec::Package { name, version } => {
                let key = (name.clone(), version.clone());
                if let Some(path) = self.packages.lock().get(&key) {
                    return Ok(path.clone());
                }
                let path = canonical(&self.source.fetch(name, version)?)?;
                // first lookup wins if two threads raced
                let mut packages = self.packages.lock();
                Ok(packages.entry(key).or_insert(path).clone())
            }
        }
    }
}

fn canonical(path: &Path) -> Result<PathBuf, String> {
    let path = path.canonicalize()
        .map_err(|e| format!("{}: {}", path.display(), e))?;
    if path.is_file() {
        Ok(path)
    } else {
        Err(format!("{} is not a file", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        inner: LocalPackageSource,
        calls: AtomicUsize,
    }

    impl PackageSource for CountingSource {
        fn fetch(&self, name: &str, version: &str) -> Result<PathBuf, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.fetch(name, version)
        }
    }

    fn write_package(root: &Path, name: &str, version: &str) {
        let dir = root.join(name.to_lowercase()).join(version);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(PACKAGE_ENTRY), "var loaded = true;").unwrap();
    }

    #[test]
    fn test_files_dedup_first_seen_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.emxs"), "").unwrap();
        fs::write(dir.path().join("b.emxs"), "").unwrap();
        let resolver = Resolver::new(Arc::new(LocalPackageSource::new(dir.path())));

        let specs = vec![
            DependencySpec::file("b.emxs"),
            DependencySpec::file("a.emxs"),
            DependencySpec::file("./b.emxs"),
        ];
        let refs = resolver.resolve(&specs, dir.path()).unwrap();
        let names: Vec<_> = refs.iter()
            .map(|r| r.path().unwrap().file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["b.emxs", "a.emxs"]);
    }

    #[test]
    fn test_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.emxs"), "").unwrap();
        write_package(dir.path(), "Geometry", "1.0.0");
        let resolver = Resolver::new(Arc::new(LocalPackageSource::new(dir.path())));
        let specs = vec![DependencySpec::file("a.emxs"), DependencySpec::package("Geometry", "1.0.0")];
        let first = resolver.resolve(&specs, dir.path()).unwrap();
        let second = resolver.resolve(&specs, dir.path()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_package_lookup_memoized() {
        let dir = tempfile::tempdir().unwrap();
        write_package(dir.path(), "Geometry", "1.0.0");
        let source = Arc::new(CountingSource {
            inner: LocalPackageSource::new(dir.path()),
            calls: AtomicUsize::new(0),
        });
        let resolver = Resolver::new(source.clone());
        let specs = vec![DependencySpec::package("Geometry", "1.0.0"); 3];
        let refs = resolver.resolve(&specs, dir.path()).unwrap();
        resolver.resolve(&specs, dir.path()).unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_all_or_nothing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.emxs"), "").unwrap();
        let resolver = Resolver::new(Arc::new(LocalPackageSource::new(dir.path())));
        let specs = vec![
            DependencySpec::file("a.emxs"),
            DependencySpec::package("Missing", "2.0.0"),
            DependencySpec::file("also-missing.emxs"),
        ];
        let err = resolver.resolve(&specs, dir.path()).unwrap_err();
        assert_eq!(err.spec, DependencySpec::package("Missing", "2.0.0"));
        assert!(err.to_string().starts_with("Could not resolve 'pkg:Missing@2.0.0': package not found"));
    }

    #[test]
    fn test_package_name_cannot_escape_root() {
        let source = LocalPackageSource::new("/tmp");
        assert!(source.fetch("../etc", "1").is_err());
        assert!(source.fetch("ok", "..").is_err());
    }

    #[test]
    fn test_parse_package() {
        assert_eq!(DependencySpec::parse_package("Json@13.0.1"), Some(DependencySpec::package("Json", "13.0.1")));
        assert_eq!(DependencySpec::parse_package("Json"), None);
        assert_eq!(DependencySpec::parse_package("@1"), None);
        assert_eq!(DependencySpec::package("Json", "1").to_string(), "pkg:Json@1");
    }
}
