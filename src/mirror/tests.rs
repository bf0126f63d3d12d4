use super::test_helpers::*;
use super::*;
use crate::config::{OutputMode, RetryConfig};
use crate::types::Entry;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

fn mirror_with(config: Config, source: FakeSource) -> (Mirror, Arc<FakeSource>) {
    let source = Arc::new(source);
    let mirror = Mirror::with_source(config, source.clone()).unwrap();
    (mirror, source)
}

fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

#[tokio::test]
async fn mirrors_nested_tree_to_directory() {
    let temp = tempfile::tempdir().unwrap();
    let out = temp.path().join("hello");
    let (mirror, source) = mirror_with(test_config(), sample_source());

    let report = mirror.run(&target_in(&out)).await.unwrap();

    assert_eq!(report.stats.dirs, 3);
    assert_eq!(report.stats.files, 3);
    assert_eq!(report.stats.failures, 0);
    assert_eq!(report.stats.bytes, 35);
    assert_eq!(report.stats.discovered, 3);
    assert!(report.warnings.is_empty());
    assert_eq!(source.fetches(), 3);

    assert_eq!(read(&out.join("a.txt")), "aaaaaaaaaa");
    assert_eq!(read(&out.join("sub/b.txt")), "b".repeat(20));
    assert_eq!(read(&out.join("sub/deeper/c.txt")), "ccccc");
}

#[tokio::test]
async fn two_level_tree_with_two_workers_and_no_retries() {
    let source = FakeSource::new()
        .dir(
            "",
            vec![
                Entry::file("a.txt", "mem://a", 10),
                Entry::file("b.txt", "mem://b", 20),
                Entry::dir("sub"),
            ],
        )
        .dir("sub", vec![Entry::file("sub/c.txt", "mem://c", 5)])
        .content("mem://a", b"aaaaaaaaaa")
        .content("mem://b", &[b'b'; 20])
        .content("mem://c", b"ccccc");
    let config = Config {
        concurrency: 2,
        retry: RetryConfig {
            max_retries: 0,
            ..test_config().retry
        },
        ..test_config()
    };
    let temp = tempfile::tempdir().unwrap();
    let (mirror, source) = mirror_with(config, source);

    let report = mirror.run(&target_in(temp.path())).await.unwrap();

    assert_eq!(report.stats.dirs, 2);
    assert_eq!(report.stats.files, 3);
    assert_eq!(report.stats.failures, 0);
    assert_eq!(report.stats.bytes, 35);
    assert!(source.peak_concurrency() <= 2);
    assert_eq!(read(&temp.path().join("sub/c.txt")), "ccccc");
}

#[tokio::test]
async fn report_summary_mentions_totals() {
    let temp = tempfile::tempdir().unwrap();
    let (mirror, _) = mirror_with(test_config(), sample_source());

    let report = mirror.run(&target_in(temp.path())).await.unwrap();
    let summary = report.summary();

    assert!(summary.contains("Files: 3"));
    assert!(summary.contains("Directories: 3"));
    assert!(summary.contains("All files downloaded successfully!"));
    assert!(report.into_result().is_ok());
}

#[tokio::test]
async fn counts_balance_for_wider_trees() {
    // 4 directories under the root, each holding 6 files
    let mut source = FakeSource::new();
    let mut root = Vec::new();
    let mut expected_bytes = 0;
    for d in 0..4 {
        let dir = format!("d{d}");
        root.push(Entry::dir(&dir));
        let mut files = Vec::new();
        for f in 0..6 {
            let path = format!("{dir}/f{f}.bin");
            let url = format!("mem://{path}");
            let body = vec![b'x'; d * 10 + f + 1];
            expected_bytes += body.len() as u64;
            files.push(Entry::file(&path, &url, body.len() as u64));
            source = source.content(&url, &body);
        }
        source = source.dir(&dir, files);
    }
    source = source.dir("", root);

    let temp = tempfile::tempdir().unwrap();
    let (mirror, _) = mirror_with(test_config(), source);
    let report = mirror.run(&target_in(temp.path())).await.unwrap();

    assert_eq!(report.stats.dirs, 5);
    assert_eq!(report.stats.files + report.stats.failures, 24);
    assert_eq!(report.stats.files, 24);
    assert_eq!(report.stats.bytes, expected_bytes);
}

#[tokio::test]
async fn never_exceeds_concurrency_limit() {
    for limit in [1usize, 2, 4] {
        let mut source = FakeSource::new().with_fetch_delay(Duration::from_millis(20));
        let mut files = Vec::new();
        for i in 0..12 {
            let url = format!("mem://{i}");
            files.push(Entry::file(&format!("f{i}"), &url, 1));
            source = source.content(&url, b"x");
        }
        source = source.dir("", files);

        let config = Config {
            concurrency: limit,
            ..test_config()
        };
        let temp = tempfile::tempdir().unwrap();
        let (mirror, source) = mirror_with(config, source);
        let report = mirror.run(&target_in(temp.path())).await.unwrap();

        assert_eq!(report.stats.files, 12);
        assert!(
            source.peak_concurrency() <= limit,
            "peak {} exceeded limit {}",
            source.peak_concurrency(),
            limit
        );
        if limit > 1 {
            assert!(source.peak_concurrency() > 1, "no overlap at limit {limit}");
        }
    }
}

#[tokio::test]
async fn transient_failures_within_budget_succeed() {
    let config = Config {
        retry: RetryConfig {
            max_retries: 2,
            ..test_config().retry
        },
        ..test_config()
    };
    let temp = tempfile::tempdir().unwrap();
    let (mirror, source) = mirror_with(config, sample_source().failing("mem://b", 2));

    let report = mirror.run(&target_in(temp.path())).await.unwrap();

    assert_eq!(report.stats.files, 3);
    assert_eq!(report.stats.failures, 0);
    assert_eq!(source.fetches(), 5);
}

#[tokio::test]
async fn exhausted_retries_count_one_failure() {
    let config = Config {
        retry: RetryConfig {
            max_retries: 2,
            ..test_config().retry
        },
        ..test_config()
    };
    let temp = tempfile::tempdir().unwrap();
    let out = temp.path().join("out");
    let (mirror, source) = mirror_with(config, sample_source().failing("mem://b", 3));

    let report = mirror.run(&target_in(&out)).await.unwrap();

    assert_eq!(report.stats.files, 2);
    assert_eq!(report.stats.failures, 1);
    assert_eq!(report.stats.bytes, 15);
    // 3 attempts for b, one each for a and c
    assert_eq!(source.fetches(), 5);
    assert!(!out.join("sub/b.txt").exists());
    assert!(report.summary().contains("Failures: 1"));

    let err = report.into_result().unwrap_err();
    assert!(matches!(err, Error::PartialFailure { failures: 1 }));
}

#[tokio::test]
async fn retries_back_off_between_attempts() {
    let config = Config {
        concurrency: 1,
        retry: RetryConfig::with_retries(2),
        ..Config::default()
    };
    let source = FakeSource::new()
        .with_fetch_delay(Duration::ZERO)
        .dir("", vec![Entry::file("x", "mem://x", 1)])
        .content("mem://x", b"x")
        .failing("mem://x", 2);
    let temp = tempfile::tempdir().unwrap();
    let (mirror, _) = mirror_with(config, source);
    let mut events = mirror.subscribe();

    let start = std::time::Instant::now();
    let report = mirror.run(&target_in(temp.path())).await.unwrap();

    assert_eq!(report.stats.files, 1);
    // 100ms before the second attempt, 200ms before the third
    assert!(start.elapsed() >= Duration::from_millis(300));

    let mut delays = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let Event::Retrying {
            attempt, delay_ms, ..
        } = event
        {
            delays.push((attempt, delay_ms));
        }
    }
    assert_eq!(delays, vec![(1, 100), (2, 200)]);
}

#[tokio::test]
async fn preview_lists_without_fetching() {
    let temp = tempfile::tempdir().unwrap();
    let out = temp.path().join("never");
    let (mirror, source) = mirror_with(test_config(), sample_source());

    let preview = mirror.preview(&target_in(&out)).await.unwrap();

    assert_eq!(source.fetches(), 0);
    assert!(!out.exists());
    assert_eq!(preview.stats.dirs, 3);
    assert_eq!(preview.stats.files, 3);
    assert_eq!(preview.stats.bytes, 35);

    let expected = "\
octo/hello
├── a.txt (10 B)
└── sub/
    ├── b.txt (20 B)
    └── deeper/
        └── c.txt (5 B)
";
    assert_eq!(preview.tree, expected);
    assert_eq!(preview.summary(), "Total: 3 files, 3 directories, 35 B");
}

#[tokio::test]
async fn preview_matches_run_counts() {
    let temp = tempfile::tempdir().unwrap();
    let (mirror, _) = mirror_with(test_config(), sample_source());

    let preview = mirror.preview(&target_in(temp.path())).await.unwrap();
    let report = mirror.run(&target_in(temp.path())).await.unwrap();

    assert_eq!(preview.stats.files, report.stats.files);
    assert_eq!(preview.stats.dirs, report.stats.dirs);
    assert_eq!(preview.stats.bytes, report.stats.bytes);
}

#[tokio::test]
async fn non_recursive_preview_shows_but_skips_directories() {
    let config = Config {
        recursive: false,
        ..test_config()
    };
    let temp = tempfile::tempdir().unwrap();
    let (mirror, source) = mirror_with(config, sample_source());

    let preview = mirror.preview(&target_in(temp.path())).await.unwrap();

    assert_eq!(source.lists(), 1);
    assert_eq!(preview.stats.dirs, 1);
    assert_eq!(preview.stats.files, 1);
    assert!(preview.tree.contains("└── sub/"));
}

#[tokio::test]
async fn non_recursive_run_ignores_directories() {
    let config = Config {
        recursive: false,
        ..test_config()
    };
    let temp = tempfile::tempdir().unwrap();
    let out = temp.path().join("flat");
    let (mirror, source) = mirror_with(config, sample_source());

    let report = mirror.run(&target_in(&out)).await.unwrap();

    assert_eq!(source.lists(), 1);
    assert_eq!(report.stats.dirs, 1);
    assert_eq!(report.stats.files, 1);
    assert!(out.join("a.txt").exists());
    assert!(!out.join("sub").exists());
}

#[tokio::test]
async fn update_mode_skips_files_of_matching_size() {
    let temp = tempfile::tempdir().unwrap();
    let out = temp.path().join("hello");
    std::fs::create_dir_all(out.join("sub")).unwrap();
    // Same size as remote: skipped
    std::fs::write(out.join("a.txt"), "0123456789").unwrap();
    // Different size: fetched again
    std::fs::write(out.join("sub/b.txt"), "short").unwrap();

    let config = Config {
        update: true,
        ..test_config()
    };
    let (mirror, source) = mirror_with(config, sample_source());
    let report = mirror.run(&target_in(&out)).await.unwrap();

    assert_eq!(report.stats.skipped, 1);
    assert_eq!(report.stats.files, 2);
    assert_eq!(source.fetches(), 2);
    assert_eq!(read(&out.join("a.txt")), "0123456789");
    assert_eq!(read(&out.join("sub/b.txt")), "b".repeat(20));
    assert!(report.summary().contains("Up to date: 1"));
}

#[tokio::test]
async fn update_mode_refetches_empty_files() {
    let source = FakeSource::new()
        .dir("", vec![Entry::file("empty", "mem://empty", 0)])
        .content("mem://empty", b"");
    let temp = tempfile::tempdir().unwrap();
    std::fs::write(temp.path().join("empty"), "").unwrap();

    let config = Config {
        update: true,
        ..test_config()
    };
    let (mirror, source) = mirror_with(config, source);
    let report = mirror.run(&target_in(temp.path())).await.unwrap();

    assert_eq!(report.stats.skipped, 0);
    assert_eq!(report.stats.files, 1);
    assert_eq!(source.fetches(), 1);
}

#[tokio::test]
async fn archive_mode_writes_one_record_per_entry() {
    let temp = tempfile::tempdir().unwrap();
    let archive = temp.path().join("hello.zip");
    let config = Config {
        output: OutputMode::Archive,
        ..test_config()
    };
    let (mirror, _) = mirror_with(config, sample_source());

    let report = mirror.run(&target_in(&archive)).await.unwrap();
    assert_eq!(report.stats.files, 3);

    let file = std::fs::File::open(&archive).unwrap();
    let mut zip = zip::ZipArchive::new(file).unwrap();
    let mut names: Vec<String> = (0..zip.len())
        .map(|i| zip.by_index(i).unwrap().name().to_string())
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec!["a.txt", "sub/", "sub/b.txt", "sub/deeper/", "sub/deeper/c.txt"]
    );

    let mut body = String::new();
    zip.by_name("sub/deeper/c.txt")
        .unwrap()
        .read_to_string(&mut body)
        .unwrap();
    assert_eq!(body, "ccccc");
}

#[tokio::test]
async fn archive_directory_record_precedes_its_files() {
    let temp = tempfile::tempdir().unwrap();
    let archive = temp.path().join("ordered.zip");
    let config = Config {
        output: OutputMode::Archive,
        concurrency: 1,
        ..test_config()
    };
    let (mirror, _) = mirror_with(config, sample_source());
    mirror.run(&target_in(&archive)).await.unwrap();

    let file = std::fs::File::open(&archive).unwrap();
    let mut zip = zip::ZipArchive::new(file).unwrap();
    let names: Vec<String> = (0..zip.len())
        .map(|i| zip.by_index(i).unwrap().name().to_string())
        .collect();
    let pos = |n: &str| names.iter().position(|x| x == n).unwrap();
    assert!(pos("sub/") < pos("sub/b.txt"));
    assert!(pos("sub/deeper/") < pos("sub/deeper/c.txt"));
}

#[tokio::test]
async fn unlistable_subtree_is_skipped_with_warning() {
    let source = sample_source()
        .dir(
            "",
            vec![
                Entry::file("a.txt", "mem://a", 10),
                Entry::dir("broken"),
                Entry::dir("sub"),
            ],
        )
        .broken_dir("broken");
    let temp = tempfile::tempdir().unwrap();
    let (mirror, _) = mirror_with(test_config(), source);
    let mut events = mirror.subscribe();

    let report = mirror.run(&target_in(temp.path())).await.unwrap();

    assert_eq!(report.stats.files, 3);
    assert_eq!(report.stats.failures, 0);
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].path, "broken");
    assert!(temp.path().join("sub/deeper/c.txt").exists());

    let mut saw_subtree_failure = false;
    while let Ok(event) = events.try_recv() {
        if matches!(event, Event::SubtreeFailed { ref path, .. } if path == "broken") {
            saw_subtree_failure = true;
        }
    }
    assert!(saw_subtree_failure);
}

#[tokio::test]
async fn root_listing_failure_aborts_run() {
    let temp = tempfile::tempdir().unwrap();
    let source = FakeSource::new().broken_dir("");
    let (mirror, source) = mirror_with(test_config(), source);

    let err = mirror.run(&target_in(temp.path())).await.unwrap_err();

    assert!(matches!(err, Error::Api { status: 500, .. }));
    assert_eq!(source.fetches(), 0);
}

#[tokio::test]
async fn unwritable_destination_aborts_before_listing() {
    let temp = tempfile::tempdir().unwrap();
    let blocker = temp.path().join("file");
    std::fs::write(&blocker, "x").unwrap();
    let (mirror, source) = mirror_with(test_config(), sample_source());

    let err = mirror.run(&target_in(&blocker.join("out"))).await.unwrap_err();

    assert!(matches!(err, Error::Io(_)));
    assert_eq!(source.lists(), 0);
}

#[tokio::test]
async fn subdirectory_target_strips_root_prefix() {
    let temp = tempfile::tempdir().unwrap();
    let mut target = target_in(temp.path());
    target.path = "sub".to_string();
    let (mirror, _) = mirror_with(test_config(), sample_source());

    let report = mirror.run(&target).await.unwrap();

    assert_eq!(report.stats.files, 2);
    assert_eq!(report.stats.dirs, 2);
    assert!(temp.path().join("b.txt").exists());
    assert!(temp.path().join("deeper/c.txt").exists());
}

#[tokio::test]
async fn entries_without_download_url_fail() {
    let mut entry = Entry::file("ghost", "unused", 3);
    entry.download_url = None;
    let source = FakeSource::new().dir("", vec![entry]);
    let temp = tempfile::tempdir().unwrap();
    let (mirror, source) = mirror_with(test_config(), source);

    let report = mirror.run(&target_in(temp.path())).await.unwrap();

    assert_eq!(report.stats.failures, 1);
    assert_eq!(source.fetches(), 0);
}

#[tokio::test]
async fn emits_progress_events() {
    let temp = tempfile::tempdir().unwrap();
    let (mirror, _) = mirror_with(test_config(), sample_source());
    let mut events = mirror.subscribe();

    mirror.run(&target_in(temp.path())).await.unwrap();

    let mut listed = 0;
    let mut downloaded = 0;
    while let Ok(event) = events.try_recv() {
        match event {
            Event::DirectoryListed { .. } => listed += 1,
            Event::FileDownloaded { .. } => downloaded += 1,
            _ => {}
        }
    }
    assert_eq!(listed, 3);
    assert_eq!(downloaded, 3);
}

#[test]
fn invalid_config_is_rejected() {
    let config = Config {
        concurrency: 0,
        ..Config::default()
    };
    assert!(Mirror::with_source(config, Arc::new(FakeSource::new())).is_err());
}

#[tokio::test]
async fn download_target_reports_partial_failure() {
    let config = Config {
        retry: RetryConfig {
            max_retries: 0,
            ..test_config().retry
        },
        ..test_config()
    };
    let temp = tempfile::tempdir().unwrap();
    let (mirror, _) = mirror_with(config, sample_source().failing("mem://c", 1));

    let err = mirror
        .download_target(&target_in(temp.path()))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::PartialFailure { failures: 1 }));
    assert!(temp.path().join("a.txt").exists());
}

#[tokio::test]
async fn download_target_in_preview_mode_writes_nothing() {
    let config = Config {
        preview: true,
        ..test_config()
    };
    let temp = tempfile::tempdir().unwrap();
    let out = temp.path().join("preview");
    let (mirror, source) = mirror_with(config, sample_source());

    mirror.download_target(&target_in(&out)).await.unwrap();

    assert_eq!(source.fetches(), 0);
    assert!(!out.exists());
}
