//! Whole runs against small shell scripts standing in for the thrift compiler.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use crate::discover::Discovery;
use crate::generate::{Generator, Supervision};
use crate::layout::{BuildProject, ProjectLayout};
use crate::pool::{FailurePolicy, PoolSettings};
use crate::{Error, PassKind, Runner};

/// A fake compiler that appends its arguments to a log file, then runs `body`.
struct FakeCompiler {
    _dir: TempDir,
    path: PathBuf,
    log: PathBuf,
}

impl FakeCompiler {
    fn new(body: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fake-thrift");
        let log = dir.path().join("invocations.log");

        let script = format!(
            "#!/bin/sh\nprintf '%s\\n' \"$*\" >> '{}'\n{body}\n",
            log.display()
        );
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();

        FakeCompiler {
            _dir: dir,
            path,
            log,
        }
    }

    fn executable(&self) -> String {
        self.path.to_string_lossy().to_string()
    }

    /// Every command line the compiler was invoked with, without the executable.
    fn invocations(&self) -> Vec<String> {
        match std::fs::read_to_string(&self.log) {
            Ok(log) => log.lines().map(str::to_string).collect(),
            Err(_) => Vec::new(),
        }
    }
}

fn touch(root: &Path, relative: &str) -> PathBuf {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, b"struct Foo {}").unwrap();
    path
}

fn runner(executable: String, pool: PoolSettings, supervision: Supervision) -> Runner {
    Runner::new(
        Generator::new(executable, supervision),
        Discovery::new("thrift", true).unwrap(),
        pool,
    )
}

fn sequential(executable: String) -> Runner {
    runner(executable, PoolSettings::default(), Supervision::default())
}

#[tokio::test]
async fn smoketest_main_sources_scenario() {
    let project = TempDir::new().unwrap();
    let a = touch(project.path(), "src/main/thrift/a.thrift");
    let b = touch(project.path(), "src/main/thrift/sub/b.thrift");
    let layout = ProjectLayout::conventional(project.path());
    let compiler = FakeCompiler::new("exit 0");

    let report = sequential(compiler.executable())
        .run(&layout.source_pass(), &layout.test_pass(), &CancellationToken::new())
        .await
        .unwrap();

    let out = layout.source_gen_dir();
    assert!(out.is_dir());
    assert_eq!(
        compiler.invocations(),
        vec![
            format!("-r -out {} -gen java {}", out.display(), a.display()),
            format!("-r -out {} -gen java {}", out.display(), b.display()),
        ]
    );

    assert_eq!(report.generated(), 2);
    assert_eq!(report.passes[0].invocations[0].idl, a);
    assert_eq!(report.passes[0].invocations[1].args[0], compiler.executable().as_str());
    // The test pass had nothing to do and created nothing.
    assert_eq!(report.passes[1].kind, PassKind::Test);
    assert!(report.passes[1].invocations.is_empty());
    assert!(!layout.test_gen_dir().exists());

    let mut build = BuildProject::default();
    build.register(&report);
    assert_eq!(build.compile_source_roots, vec![out]);
    assert_eq!(build.test_compile_source_roots, vec![layout.test_gen_dir()]);
}

#[tokio::test]
async fn smoketest_both_passes() {
    let project = TempDir::new().unwrap();
    touch(project.path(), "src/main/thrift/service.thrift");
    let test_idl = touch(project.path(), "src/test/thrift/fixtures.thrift");
    let layout = ProjectLayout::conventional(project.path());
    let compiler = FakeCompiler::new("exit 0");

    let report = sequential(compiler.executable())
        .run(&layout.source_pass(), &layout.test_pass(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(compiler.invocations().len(), 2);
    assert_eq!(report.passes[1].invocations[0].idl, test_idl);
    assert_eq!(report.passes[1].invocations[0].output_dir, layout.test_gen_dir());
    assert!(layout.test_gen_dir().is_dir());
    assert_eq!(
        report.test_compile_source_roots().collect::<Vec<_>>(),
        vec![layout.test_gen_dir().as_path()]
    );
}

#[tokio::test]
async fn smoketest_no_idl_files_never_invokes() {
    let project = TempDir::new().unwrap();
    touch(project.path(), "src/main/java/App.java");
    let layout = ProjectLayout::conventional(project.path());

    // Launching this would fail, so success means nothing was launched.
    let report = sequential("thrift-compiler-that-does-not-exist".to_string())
        .run(&layout.source_pass(), &layout.test_pass(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.generated(), 0);
    assert_eq!(
        report.compile_source_roots().collect::<Vec<_>>(),
        vec![layout.source_gen_dir().as_path()]
    );
}

#[tokio::test]
async fn smoketest_exit_codes() {
    let project = TempDir::new().unwrap();
    touch(project.path(), "src/main/thrift/a.thrift");
    let layout = ProjectLayout::conventional(project.path());

    for code in [1, 2, 127] {
        let compiler = FakeCompiler::new(&format!("exit {code}"));
        let err = sequential(compiler.executable())
            .run_pass(&layout.source_pass(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Generation { .. }), "{err:?}");
        assert_eq!(err.exit_code(), Some(code));
    }
}

#[tokio::test]
async fn smoketest_first_failure_wins() {
    let project = TempDir::new().unwrap();
    touch(project.path(), "src/main/thrift/a.thrift");
    touch(project.path(), "src/main/thrift/b.thrift");
    touch(project.path(), "src/main/thrift/c.thrift");
    touch(project.path(), "src/test/thrift/d.thrift");
    let layout = ProjectLayout::conventional(project.path());
    let compiler = FakeCompiler::new("exit 3");

    let err = sequential(compiler.executable())
        .run(&layout.source_pass(), &layout.test_pass(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.exit_code(), Some(3));
    // Neither the remaining main files nor the test pass were attempted.
    assert_eq!(compiler.invocations().len(), 1);
    assert!(compiler.invocations()[0].ends_with("a.thrift"));
}

#[tokio::test]
async fn smoketest_collect_all_failures() {
    let project = TempDir::new().unwrap();
    touch(project.path(), "src/main/thrift/a.thrift");
    touch(project.path(), "src/main/thrift/b.thrift");
    touch(project.path(), "src/main/thrift/c.thrift");
    let layout = ProjectLayout::conventional(project.path());
    let compiler = FakeCompiler::new("case \"$*\" in *b.thrift) exit 0 ;; esac\nexit 4");

    let pool = PoolSettings {
        concurrency: 2,
        failure_policy: FailurePolicy::CollectAll,
    };
    let err = runner(compiler.executable(), pool, Supervision::default())
        .run_pass(&layout.source_pass(), &CancellationToken::new())
        .await
        .unwrap_err();

    let Error::Multiple(errors) = err else {
        panic!("expected multiple errors, found {err:?}");
    };
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|err| err.exit_code() == Some(4)));
    assert_eq!(compiler.invocations().len(), 3);
}

#[tokio::test]
async fn smoketest_concurrent_keeps_discovery_order() {
    let project = TempDir::new().unwrap();
    let idls: Vec<_> = ["a", "b", "c", "d", "e"]
        .iter()
        .map(|name| touch(project.path(), &format!("src/main/thrift/{name}.thrift")))
        .collect();
    let layout = ProjectLayout::conventional(project.path());
    let compiler = FakeCompiler::new("exit 0");

    let pool = PoolSettings {
        concurrency: 4,
        failure_policy: FailurePolicy::FirstFailure,
    };
    let report = runner(compiler.executable(), pool, Supervision::default())
        .run_pass(&layout.source_pass(), &CancellationToken::new())
        .await
        .unwrap();

    let generated: Vec<_> = report.invocations.iter().map(|inv| inv.idl.clone()).collect();
    assert_eq!(generated, idls);
    assert_eq!(compiler.invocations().len(), 5);
}

#[tokio::test]
async fn smoketest_cancel_terminates_compiler() {
    let project = TempDir::new().unwrap();
    touch(project.path(), "src/main/thrift/a.thrift");
    let layout = ProjectLayout::conventional(project.path());
    let compiler = FakeCompiler::new("exec sleep 30");

    let cancel = CancellationToken::new();
    let cancel_ = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel_.cancel();
    });

    let start = Instant::now();
    let err = sequential(compiler.executable())
        .run(&layout.source_pass(), &layout.test_pass(), &cancel)
        .await
        .unwrap_err();

    assert!(err.is_interrupted(), "{err:?}");
    assert!(start.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn smoketest_stubborn_compiler_is_killed() {
    let project = TempDir::new().unwrap();
    touch(project.path(), "src/main/thrift/a.thrift");
    let layout = ProjectLayout::conventional(project.path());
    let compiler = FakeCompiler::new("trap '' TERM\nsleep 30 &\nwait");

    let supervision = Supervision {
        timeout: Some(Duration::from_millis(200)),
        kill_grace: Duration::from_millis(200),
    };
    let start = Instant::now();
    let err = runner(compiler.executable(), PoolSettings::default(), supervision)
        .run_pass(&layout.source_pass(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(
        matches!(err, Error::Timeout { timeout, .. } if timeout == Duration::from_millis(200)),
        "{err:?}"
    );
    assert!(start.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn smoketest_strict_missing_root() {
    let project = TempDir::new().unwrap();
    let layout = ProjectLayout::conventional(project.path());
    let runner = Runner::new(
        Generator::new("thrift", Supervision::default()),
        Discovery::new("thrift", false).unwrap(),
        PoolSettings::default(),
    );

    let err = runner
        .run(&layout.source_pass(), &layout.test_pass(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::IdlRoot { ref path, .. } if path == &layout.source_idl_dir()));
}

#[test]
fn smoketest_runner_from_configs() {
    let configs = crate::cfgs::default_set();
    assert!(matches!(
        Runner::from_configs("  ", &configs),
        Err(Error::Config(_))
    ));

    // Glob metacharacters in the suffix are matched literally.
    configs.try_update("idl_suffix", "[").unwrap();
    let runner = Runner::from_configs("thrift", &configs).unwrap();
    assert!(runner.discovery().is_idl(Path::new("a.[")));
    assert!(!runner.discovery().is_idl(Path::new("a.thrift")));

    configs.try_update("idl_suffix", "thrift").unwrap();
    let runner = Runner::from_configs("thrift", &configs).unwrap();
    assert!(runner.discovery().is_idl(Path::new("a.thrift")));
}
