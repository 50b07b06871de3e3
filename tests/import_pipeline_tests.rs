mod common;

use common::*;
use rust_manga_importer::config::{Config, EmptySelectionPolicy};
use rust_manga_importer::report::ChapterStatus;
use rust_manga_importer::{ImportError, ImportRequest, SourceKind};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn numbers(outcome: &rust_manga_importer::ImportOutcome) -> Vec<String> {
    outcome.result.chapters.iter().map(|c| c.number.clone()).collect()
}

#[tokio::test]
async fn test_range_selects_requested_chapters_in_order() {
    let page = series_page("Tower", None, &[(3, "3", 5), (1, "1", 5), (2, "2", 5)]);
    let stub = StubFetcher::new().text(SERIES_URL, page);
    let stub = with_chapter(with_chapter(with_chapter(stub, 1, 5), 2, 5), 3, 5);
    let (importer, dir) = importer_with(Arc::new(stub), Config::default());

    let request = ImportRequest::new(SERIES_URL).range("2-3");
    let outcome = importer.import(&request, &CancellationToken::new()).await.unwrap();

    assert_eq!(numbers(&outcome), vec!["2", "3"]);
    for chapter in &outcome.result.chapters {
        assert_eq!(chapter.pages.len(), 5);
        for (i, path) in chapter.pages.iter().enumerate() {
            assert!(path.starts_with(&format!("pages/Tower/Chapter-{}/", chapter.number)));
            assert!(path.ends_with(&format!("_page{:03}.jpg", i + 1)));
            assert!(dir.path().join(path).exists());
        }
    }
    assert_eq!(outcome.report.catalog_size, 3);
    assert_eq!(outcome.report.selected, 2);
    assert!(!outcome.report.selection_fallback);
}

#[tokio::test]
async fn test_duplicate_release_keeps_variant_with_most_pages() {
    let page = series_page("Dupes", None, &[(101, "1", 4), (102, "1", 9), (103, "2", 3)]);
    let stub = StubFetcher::new().text(SERIES_URL, page);
    let stub = with_chapter(with_chapter(with_chapter(stub, 101, 4), 102, 9), 103, 3);
    let stub = Arc::new(stub);
    let (importer, _dir) = importer_with(stub.clone(), Config::default());

    let outcome = importer
        .import(&ImportRequest::new(SERIES_URL), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(numbers(&outcome), vec!["1", "2"]);
    assert_eq!(outcome.result.chapters[0].pages.len(), 9);
    assert_eq!(outcome.report.chapters[0].source_id, chapter_url(102));
    // The losing variant is never fetched
    assert!(!stub.requests().iter().any(|r| r.url == chapter_url(101)));
}

#[tokio::test]
async fn test_source_chapter_number_is_kept_verbatim() {
    let page = series_page("Long Run", None, &[(287, "287.00", 2), (288, "287.5", 2)]);
    let stub = with_chapter(with_chapter(StubFetcher::new().text(SERIES_URL, page), 287, 2), 288, 2);
    let (importer, _dir) = importer_with(Arc::new(stub), Config::default());

    let outcome = importer
        .import(&ImportRequest::new(SERIES_URL), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(numbers(&outcome), vec!["287.00", "287.5"]);
    assert!(outcome.result.chapters[0].pages[0].starts_with("pages/Long-Run/Chapter-287/"));
    assert!(outcome.result.chapters[1].pages[0].starts_with("pages/Long-Run/Chapter-287.5/"));
}

#[tokio::test]
async fn test_chapter_with_no_downloadable_pages_is_dropped() {
    let page = series_page("Broken", None, &[(3, "3", 2), (4, "4", 2)]);
    let stub = with_chapter(StubFetcher::new().text(SERIES_URL, page), 3, 2)
        .text(&chapter_url(4), chapter_page(&image_urls(4, 2)))
        .status(&image_urls(4, 2)[0], 404);
    let (importer, _dir) = importer_with(Arc::new(stub), Config::default());

    let outcome = importer
        .import(&ImportRequest::new(SERIES_URL), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(numbers(&outcome), vec!["3"]);
    let dropped = &outcome.report.chapters[1];
    assert_eq!(dropped.number, "4");
    assert_eq!(dropped.status, ChapterStatus::NoPages);
    assert_eq!(dropped.failed_pages().count(), 2);
    assert!(dropped.failed_pages().any(|e| e.reason.contains("404")));
    assert_eq!(outcome.report.failed_pages(), 2);
}

#[tokio::test]
async fn test_only_chapter_failing_reports_no_chapters_downloaded() {
    let page = series_page("Broken", None, &[(4, "4", 3)]);
    let stub = StubFetcher::new()
        .text(SERIES_URL, page)
        .text(&chapter_url(4), chapter_page(&image_urls(4, 3)));
    let (importer, _dir) = importer_with(Arc::new(stub), Config::default());

    let err = importer
        .import(&ImportRequest::new(SERIES_URL), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "no chapters were successfully downloaded");
    match err {
        ImportError::NoChaptersDownloaded { report } => {
            assert_eq!(report.chapters.len(), 1);
            assert_eq!(report.chapters[0].status, ChapterStatus::NoPages);
            assert_eq!(report.page_success_rate(), 0.0);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_failed_pages_are_skipped_not_fatal() {
    let urls = image_urls(7, 3);
    let page = series_page("Gaps", None, &[(7, "7", 3)]);
    let stub = StubFetcher::new()
        .text(SERIES_URL, page)
        .text(&chapter_url(7), chapter_page(&urls))
        .image(&urls[0], b"one")
        .status(&urls[1], 503)
        .image(&urls[2], b"three");
    let (importer, dir) = importer_with(Arc::new(stub), Config::default());

    let outcome = importer
        .import(&ImportRequest::new(SERIES_URL), &CancellationToken::new())
        .await
        .unwrap();

    let pages = &outcome.result.chapters[0].pages;
    assert_eq!(pages.len(), 2);
    assert!(pages[0].ends_with("_page001.jpg"));
    assert!(pages[1].ends_with("_page003.jpg"));
    assert_eq!(std::fs::read(dir.path().join(&pages[1])).unwrap(), b"three");
    assert_eq!(outcome.report.chapters[0].status, ChapterStatus::Completed);
    assert_eq!(outcome.report.failed_pages(), 1);
}

#[tokio::test]
async fn test_unmatched_range_falls_back_to_whole_catalog() {
    let page = series_page("Fallback", None, &[(1, "1", 1), (2, "2", 1)]);
    let stub = with_chapter(with_chapter(StubFetcher::new().text(SERIES_URL, page), 1, 1), 2, 1);
    let (importer, _dir) = importer_with(Arc::new(stub), Config::default());

    let request = ImportRequest::new(SERIES_URL).range("50-60");
    let outcome = importer.import(&request, &CancellationToken::new()).await.unwrap();

    assert_eq!(numbers(&outcome), vec!["1", "2"]);
    assert!(outcome.report.selection_fallback);
}

#[tokio::test]
async fn test_malformed_range_falls_back_to_whole_catalog() {
    let page = series_page("Fallback", None, &[(1, "1", 1)]);
    let stub = with_chapter(StubFetcher::new().text(SERIES_URL, page), 1, 1);
    let (importer, _dir) = importer_with(Arc::new(stub), Config::default());

    let request = ImportRequest::new(SERIES_URL).range("abc, x-y");
    let outcome = importer.import(&request, &CancellationToken::new()).await.unwrap();
    assert_eq!(numbers(&outcome), vec!["1"]);
    assert!(outcome.report.selection_fallback);
}

#[tokio::test]
async fn test_reject_policy_fails_on_empty_selection() {
    let page = series_page("Strict", None, &[(1, "1", 1)]);
    let stub = Arc::new(with_chapter(StubFetcher::new().text(SERIES_URL, page), 1, 1));
    let config = Config {
        empty_selection: EmptySelectionPolicy::Reject,
        ..Config::default()
    };
    let (importer, _dir) = importer_with(stub.clone(), config);

    let request = ImportRequest::new(SERIES_URL).range("9");
    let err = importer.import(&request, &CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, ImportError::EmptySelection { ref expression } if expression == "9"));
    assert!(!stub.requests().iter().any(|r| r.url == chapter_url(1)));
}

#[tokio::test]
async fn test_invalid_url_fails_before_any_request() {
    let stub = Arc::new(StubFetcher::new());
    let (importer, _dir) = importer_with(stub.clone(), Config::default());

    for url in ["https://example.com/about", "not a url", "https://mangadex.org/title/not-a-uuid"] {
        let err = importer
            .import(&ImportRequest::new(url), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::InvalidUrl { .. }), "{}", url);
    }
    assert_eq!(stub.request_count(), 0);
}

#[tokio::test]
async fn test_forced_source_must_accept_the_url() {
    let stub = Arc::new(StubFetcher::new());
    let (importer, _dir) = importer_with(stub.clone(), Config::default());

    let request = ImportRequest::new(SERIES_URL).source(SourceKind::Gallery);
    let err = importer.import(&request, &CancellationToken::new()).await.unwrap_err();
    assert!(err.to_string().starts_with("invalid url for source"));
    assert_eq!(stub.request_count(), 0);
}

#[tokio::test]
async fn test_unreachable_landing_page_is_a_metadata_error() {
    let stub = StubFetcher::new().status(SERIES_URL, 500);
    let (importer, _dir) = importer_with(Arc::new(stub), Config::default());

    let err = importer
        .import(&ImportRequest::new(SERIES_URL), &CancellationToken::new())
        .await
        .unwrap_err();
    match err {
        ImportError::Metadata { reason } => assert!(reason.contains("500")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_empty_catalog() {
    let stub = StubFetcher::new().text(SERIES_URL, series_page("Nothing Yet", None, &[]));
    let (importer, _dir) = importer_with(Arc::new(stub), Config::default());

    let err = importer
        .import(&ImportRequest::new(SERIES_URL), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "no chapters found");
}

#[tokio::test]
async fn test_cover_is_stored_or_replaced_by_placeholder() {
    let cover = "https://cdn.example/covers/42.png";
    let page = series_page("Covered", Some(cover), &[(1, "1", 1)]);
    let stub = Arc::new(with_chapter(StubFetcher::new().text(SERIES_URL, page.clone()).image(cover, b"png"), 1, 1));
    let (importer, dir) = importer_with(stub.clone(), Config::default());

    let outcome = importer
        .import(&ImportRequest::new(SERIES_URL), &CancellationToken::new())
        .await
        .unwrap();
    let stored = &outcome.result.title.cover;
    assert!(stored.starts_with("covers/") && stored.ends_with(".png"));
    assert!(dir.path().join(stored).exists());
    assert_eq!(outcome.result.title.author, "Test Author");
    let cover_request = stub.requests().into_iter().find(|r| r.url == cover).unwrap();
    assert_eq!(cover_request.referer.as_deref(), Some("https://reader.example/"));

    // Same series, cover missing upstream
    let stub = with_chapter(StubFetcher::new().text(SERIES_URL, page), 1, 1);
    let (importer, _dir) = importer_with(Arc::new(stub), Config::default());
    let outcome = importer
        .import(&ImportRequest::new(SERIES_URL), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome.result.title.cover, "covers/placeholder.jpg");
    assert!(outcome.report.cover_error.is_some());
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let stub = Arc::new(StubFetcher::new().text(SERIES_URL, series_page("T", None, &[(1, "1", 1)])));
    let (importer, _dir) = importer_with(stub.clone(), Config::default());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = importer.import(&ImportRequest::new(SERIES_URL), &cancel).await.unwrap_err();
    assert!(matches!(err, ImportError::Cancelled));
    assert_eq!(stub.request_count(), 0);
}

#[tokio::test]
async fn test_cancellation_discards_partial_chapter() {
    let cancel = CancellationToken::new();
    let page = series_page("Long Run", None, &[(1, "1", 2), (2, "2", 3), (3, "3", 1)]);
    let stub = with_chapter(with_chapter(with_chapter(StubFetcher::new().text(SERIES_URL, page), 1, 2), 2, 3), 3, 1)
        .cancel_after_images(3, cancel.clone());
    let (importer, dir) = importer_with(Arc::new(stub), Config::default());

    let outcome = importer.import(&ImportRequest::new(SERIES_URL), &cancel).await.unwrap();

    assert_eq!(numbers(&outcome), vec!["1"]);
    assert!(outcome.report.cancelled);
    assert_eq!(outcome.report.chapters[1].status, ChapterStatus::Cancelled);
    assert_eq!(outcome.report.chapters.len(), 2);

    let partial = dir.path().join("pages/Long-Run/Chapter-2");
    let leftovers = std::fs::read_dir(&partial).map(|d| d.count()).unwrap_or(0);
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn test_cancellation_during_first_chapter_is_an_error() {
    let cancel = CancellationToken::new();
    let page = series_page("Short", None, &[(1, "1", 3)]);
    let stub = with_chapter(StubFetcher::new().text(SERIES_URL, page), 1, 3).cancel_after_images(1, cancel.clone());
    let (importer, _dir) = importer_with(Arc::new(stub), Config::default());

    let err = importer.import(&ImportRequest::new(SERIES_URL), &cancel).await.unwrap_err();
    assert!(matches!(err, ImportError::Cancelled));
}

#[tokio::test]
async fn test_reimport_into_fresh_directory_is_stable() {
    let build = || {
        let page = series_page("Stable", None, &[(1, "1", 2), (2, "2.5", 4)]);
        Arc::new(with_chapter(with_chapter(StubFetcher::new().text(SERIES_URL, page), 1, 2), 2, 4))
    };

    let mut shapes = Vec::new();
    for _ in 0..2 {
        let (importer, _dir) = importer_with(build(), Config::default());
        let outcome = importer
            .import(&ImportRequest::new(SERIES_URL), &CancellationToken::new())
            .await
            .unwrap();
        let shape: Vec<(String, usize)> = outcome
            .result
            .chapters
            .iter()
            .map(|c| (c.number.clone(), c.pages.len()))
            .collect();
        shapes.push(shape);
    }
    assert_eq!(shapes[0], vec![("1".to_string(), 2), ("2.5".to_string(), 4)]);
    assert_eq!(shapes[0], shapes[1]);
}
