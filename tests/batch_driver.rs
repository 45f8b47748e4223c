mod fixtures;

use shelfscan::batch::{BatchDriver, BatchProgress, CANCELLED};
use shelfscan::extract::{ExtractOptions, Extractor};
use shelfscan::formats::BatchItemResult;
use tokio_util::sync::CancellationToken;

fn driver() -> BatchDriver {
    BatchDriver::new(Extractor::local(ExtractOptions::default(), Some(5)))
}

#[tokio::test]
async fn failing_item_is_isolated_and_order_is_kept() -> anyhow::Result<()> {
    let temp = tempfile::TempDir::new()?;
    let first = temp.path().join("first.epub");
    let third = temp.path().join("third.epub");
    fixtures::epub3().write(&first)?;
    fixtures::epub2().write(&third)?;

    let paths = vec![
        first.to_string_lossy().into_owned(),
        temp.path().join("missing.epub").to_string_lossy().into_owned(),
        third.to_string_lossy().into_owned(),
    ];

    let mut driver = driver();
    let results = driver.run(&paths).await;

    assert_eq!(results.len(), 3);
    for (result, path) in results.iter().zip(&paths) {
        assert_eq!(result.path(), path);
    }
    assert!(results[0].is_success());
    assert!(results[2].is_success());
    match &results[1] {
        BatchItemResult::Failure { error_message, .. } => {
            assert!(error_message.contains("missing.epub"), "{error_message}");
        }
        other => panic!("expected failure, got {other:?}"),
    }

    assert_eq!(driver.progress(), BatchProgress::default());
    Ok(())
}

#[tokio::test]
async fn progress_is_published_per_item() -> anyhow::Result<()> {
    let temp = tempfile::TempDir::new()?;
    let book = temp.path().join("book.epub");
    fixtures::epub3().write(&book)?;
    let book = book.to_string_lossy().into_owned();

    let mut driver = driver();
    let mut progress = driver.subscribe();
    let watcher = tokio::spawn(async move {
        let mut seen = Vec::new();
        while progress.changed().await.is_ok() {
            let current = progress.borrow_and_update().clone();
            let done = !current.processing && !seen.is_empty();
            seen.push(current);
            if done {
                break;
            }
        }
        seen
    });

    let results = driver.run(&[book.clone(), book.clone()]).await;
    assert_eq!(results.len(), 2);
    drop(driver);

    let seen = watcher.await?;
    let last = seen.last().cloned().unwrap_or_default();
    assert_eq!(last, BatchProgress::default());
    assert!(seen.iter().all(|p| p.percent <= 100));
    assert!(
        seen.iter()
            .filter(|p| p.processing)
            .all(|p| p.current_path.as_deref() == Some(book.as_str()))
    );
    Ok(())
}

#[tokio::test]
async fn cancelled_run_still_reports_every_path() -> anyhow::Result<()> {
    let temp = tempfile::TempDir::new()?;
    let book = temp.path().join("book.epub");
    fixtures::epub3().write(&book)?;
    let book = book.to_string_lossy().into_owned();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let mut driver = driver().with_cancellation(cancel);
    let results = driver.run(&[book.clone(), book]).await;

    assert_eq!(results.len(), 2);
    for result in &results {
        match result {
            BatchItemResult::Failure { error_message, .. } => assert_eq!(error_message, CANCELLED),
            other => panic!("expected cancellation, got {other:?}"),
        }
    }
    Ok(())
}

#[tokio::test]
async fn run_dir_extracts_what_the_scan_finds() -> anyhow::Result<()> {
    let temp = tempfile::TempDir::new()?;
    std::fs::create_dir_all(temp.path().join("a/b"))?;
    fixtures::epub3().write(&temp.path().join("a/one.epub"))?;
    fixtures::epub2().write(&temp.path().join("a/b/two.EPUB"))?;
    fixtures::write_garbage(&temp.path().join("three.epub"))?;
    std::fs::write(temp.path().join("notes.txt"), "not a book")?;

    let mut driver = driver();
    let results = driver.run_dir(temp.path(), 10).await?;
    let names = results
        .iter()
        .map(|r| r.path().rsplit('/').next().unwrap_or_default().to_owned())
        .collect::<Vec<_>>();
    assert_eq!(names, ["two.EPUB", "one.epub", "three.epub"]);
    assert!(results.iter().all(BatchItemResult::is_success));

    let capped = driver.run_dir(temp.path(), 2).await?;
    assert_eq!(capped.len(), 2);
    Ok(())
}
