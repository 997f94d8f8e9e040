//! Where IDL files live in a project, where generated sources go, and the project model that
//! generated sources get registered with.

use std::path::{Path, PathBuf};

use crate::{GenerationPass, PassKind, RunReport};

/// Folder, next to the source folder, that holds IDL files.
pub static IDL_FOLDER: &str = "thrift";
/// Build subdirectory for generated files.
pub static GEN_FOLDER: &str = "thrift";
/// Build subdirectory for generated test files.
pub static GEN_TEST_FOLDER: &str = "test-thrift";

/// Source and build directories of a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    /// Directory of the main sources, e.g. `src/main/java`.
    pub source_dir: PathBuf,
    /// Directory of the test sources, e.g. `src/test/java`.
    pub test_source_dir: PathBuf,
    /// Directory build output goes to, e.g. `target`.
    pub build_dir: PathBuf,
}

impl ProjectLayout {
    /// The conventional Maven layout rooted at `project_dir`.
    pub fn conventional(project_dir: &Path) -> Self {
        ProjectLayout {
            source_dir: project_dir.join("src/main/java"),
            test_source_dir: project_dir.join("src/test/java"),
            build_dir: project_dir.join("target"),
        }
    }

    /// IDL folder for the main sources, a sibling of [`ProjectLayout::source_dir`].
    pub fn source_idl_dir(&self) -> PathBuf {
        sibling(&self.source_dir, IDL_FOLDER)
    }

    /// IDL folder for the test sources, a sibling of [`ProjectLayout::test_source_dir`].
    pub fn test_idl_dir(&self) -> PathBuf {
        sibling(&self.test_source_dir, IDL_FOLDER)
    }

    pub fn source_gen_dir(&self) -> PathBuf {
        self.build_dir.join(GEN_FOLDER)
    }

    pub fn test_gen_dir(&self) -> PathBuf {
        self.build_dir.join(GEN_TEST_FOLDER)
    }

    /// The pass over main sources.
    pub fn source_pass(&self) -> GenerationPass {
        GenerationPass {
            kind: PassKind::Main,
            idl_root: self.source_idl_dir(),
            output_dir: self.source_gen_dir(),
        }
    }

    /// The pass over test sources.
    pub fn test_pass(&self) -> GenerationPass {
        GenerationPass {
            kind: PassKind::Test,
            idl_root: self.test_idl_dir(),
            output_dir: self.test_gen_dir(),
        }
    }
}

fn sibling(dir: &Path, name: &str) -> PathBuf {
    match dir.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}

/// The parts of a build's project model that generation touches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildProject {
    /// Directories compiled as part of the main sources.
    pub compile_source_roots: Vec<PathBuf>,
    /// Directories compiled as part of the test sources.
    pub test_compile_source_roots: Vec<PathBuf>,
}

impl BuildProject {
    /// Register the output directories of every pass in `report`.
    ///
    /// A root that is already registered is not added again.
    pub fn register(&mut self, report: &RunReport) {
        for pass in &report.passes {
            let roots = match pass.kind {
                PassKind::Main => &mut self.compile_source_roots,
                PassKind::Test => &mut self.test_compile_source_roots,
            };
            if !roots.contains(&pass.output_dir) {
                tracing::debug!(
                    kind = ?pass.kind,
                    root = ?pass.output_dir,
                    "registering source root"
                );
                roots.push(pass.output_dir.clone());
            }
        }
    }
}
