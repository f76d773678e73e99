use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::io::{Read, Write};
use std::path::Path;
use xz2::write::XzEncoder;

use epgsync::epg::XmltvDocument;
use epgsync::{Config, MemoryFetcher, consolidate, correct_playlist};

const GUIDE_A: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<tv generator-info-name="a">
  <channel id="bbc1.uk"><display-name>BBC One</display-name></channel>
  <channel id="c4.uk"><display-name>Channel 4</display-name></channel>
  <programme channel="bbc1.uk" start="20250101060000 +0000"><title>Breakfast</title></programme>
  <programme channel="c4.uk" start="20250101060000 +0000"><title>Countdown</title></programme>
</tv>"#;

const GUIDE_B: &str = r#"<tv>
  <channel id="c4.uk"><display-name>Channel Four</display-name></channel>
  <channel id="itv1.uk"><display-name>ITV1</display-name></channel>
  <programme channel="itv1.uk" start="20250101060000 +0000"><title>GMB</title></programme>
</tv>"#;

fn gzip(data: &str) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data.as_bytes()).unwrap();
    encoder.finish().unwrap()
}

fn xz(data: &str) -> Vec<u8> {
    let mut encoder = XzEncoder::new(Vec::new(), 6);
    encoder.write_all(data.as_bytes()).unwrap();
    encoder.finish().unwrap()
}

fn config_in(dir: &Path) -> Config {
    let mut config = Config::default();
    config.temp_dir = Some(dir.join("tmp"));
    config.output.playlist = dir.join("output").join("PLAYLIST.m3u");
    config.output.epg = dir.join("output").join("EPG.xml.gz");
    config
}

fn fetcher() -> MemoryFetcher {
    MemoryFetcher::new()
        .with("http://epg.example.org/a.xml.gz", gzip(GUIDE_A))
        .with("http://epg.example.net/b.xml.xz", xz(GUIDE_B))
        .with("http://epg.example.com/broken.xml.gz", b"<tv>not gzip</tv>".to_vec())
}

#[tokio::test]
async fn correct_rewrites_playlist_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lista1.m3u");
    std::fs::write(
        &path,
        "#EXTM3U url-tvg=\"http://epg.example.org/a.xml.gz,http://epg.example.com/broken.xml.gz\" x-tvg-url=\"http://epg.example.net/b.xml.xz\"\r\n\
         #EXTINF:-1 tvg-id=\"bbc1.uk\" tvg-name=\"BBC One\",BBC One\r\n\
         http://streams.example.org/bbc1.m3u8\r\n\
         #EXTINF:-1 tvg-id=\"N/A\" tvg-name=\"Channel 4\",Channel 4\r\n\
         http://streams.example.org/c4.m3u8\r\n\
         #EXTINF:-1 tvg-name=\"ITV\" group-title=\"UK\",ITV1\r\n\
         http://streams.example.org/itv1.m3u8\r\n\
         #EXTINF:-1 tvg-id=\"zzz\",Unknown\r\n\
         http://streams.example.org/zzz.m3u8\r\n",
    )
    .unwrap();

    let report = correct_playlist(&config_in(dir.path()), &fetcher(), &path, false)
        .await
        .unwrap();

    let summary = report.summary.unwrap();
    assert_eq!(summary.corrected, 2);
    assert_eq!(summary.valid, 1);
    assert_eq!(summary.unmatched, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].url, "http://epg.example.com/broken.xml.gz");

    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("#EXTINF:-1 tvg-id=\"c4.uk\" tvg-name=\"Channel 4\",Channel 4\r\n"));
    assert!(written.contains("#EXTINF:-1 tvg-id=\"itv1.uk\" tvg-name=\"ITV\" group-title=\"UK\",ITV1\r\n"));
    assert!(written.contains("#EXTINF:-1 tvg-id=\"zzz\",Unknown\r\n"));
    assert_eq!(written.matches("http://streams.example.org/").count(), 4);
    assert!(written.ends_with("zzz.m3u8\r\n"));

    // temp downloads are gone
    assert_eq!(std::fs::read_dir(dir.path().join("tmp")).unwrap().count(), 0);
}

#[tokio::test]
async fn correct_twice_is_stable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lista1.m3u");
    std::fs::write(
        &path,
        "#EXTM3U url-tvg=\"http://epg.example.org/a.xml.gz\"\n\
         #EXTINF:-1 tvg-id=\"\" tvg-name=\"BBC One\",BBC One\n\
         http://streams.example.org/bbc1.m3u8\n",
    )
    .unwrap();
    let config = config_in(dir.path());

    correct_playlist(&config, &fetcher(), &path, false).await.unwrap();
    let once = std::fs::read_to_string(&path).unwrap();

    let report = correct_playlist(&config, &fetcher(), &path, false).await.unwrap();
    let twice = std::fs::read_to_string(&path).unwrap();

    assert_eq!(once, twice);
    assert_eq!(report.summary.unwrap().corrected, 0);
}

#[tokio::test]
async fn correct_leaves_playlist_when_all_sources_fail() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lista1.m3u");
    let text = "#EXTM3U url-tvg=\"http://epg.example.com/broken.xml.gz\"\n#EXTINF:-1,One\nhttp://x.example.org/1\n";
    std::fs::write(&path, text).unwrap();

    let report = correct_playlist(&config_in(dir.path()), &fetcher(), &path, false)
        .await
        .unwrap();

    assert!(report.summary.is_none());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), text);
}

#[tokio::test]
async fn consolidate_writes_playlist_and_guide() {
    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("local.m3u");
    std::fs::write(
        &local,
        "#EXTM3U x-tvg-url=\"http://epg.example.net/b.xml.xz\"\n#EXTINF:-1 tvg-id=\"itv1.uk\",ITV1\nhttp://s.example.org/itv1\n",
    )
    .unwrap();

    let fetcher = fetcher().with(
        "http://lists.example.org/remote.m3u",
        "#EXTM3U url-tvg=\"http://epg.example.org/a.xml.gz, http://epg.example.com/broken.xml.gz;\"\n\
         #EXTINF:-1 tvg-id=\"bbc1.uk\",BBC One\nhttp://s.example.org/bbc1\n",
    );

    let mut config = config_in(dir.path());
    config.playlists = vec![
        "http://lists.example.org/remote.m3u".to_string(),
        local.display().to_string(),
        "http://lists.example.org/missing.m3u".to_string(),
    ];
    config.epg.extra_sources = vec!["http://img.example.org/logo.png".to_string()];

    let report = consolidate(&config, &fetcher).await.unwrap();

    assert_eq!(report.playlists.succeeded.len(), 2);
    assert_eq!(report.playlists.failed.len(), 1);
    assert_eq!(report.playlists.channels, 2);
    assert_eq!(report.rejected_sources.len(), 1);

    let playlist = std::fs::read_to_string(&config.output.playlist).unwrap();
    assert_eq!(playlist.matches("#EXTM3U").count(), 1);
    assert!(playlist.starts_with("#EXTM3U url-tvg="));

    assert_eq!(
        report.epg.succeeded,
        vec!["http://epg.example.org/a.xml.gz", "http://epg.example.net/b.xml.xz"]
    );
    assert_eq!(report.epg.failed.len(), 1);
    assert_eq!(report.epg.failed[0].kind, "decompression");
    assert_eq!(report.epg.channels, 3);
    assert_eq!(report.epg.programmes, 3);

    let mut xml = String::new();
    GzDecoder::new(std::fs::File::open(&config.output.epg).unwrap())
        .read_to_string(&mut xml)
        .unwrap();
    let doc = XmltvDocument::parse(&xml).unwrap();
    let ids: Vec<_> = doc.channels.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["bbc1.uk", "c4.uk", "itv1.uk"]);
    let c4 = &doc.channels[1];
    assert_eq!(c4.display_name.as_deref(), Some("Channel 4"));
}

#[tokio::test]
async fn consolidate_without_guides_skips_epg_output() {
    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("plain.m3u");
    std::fs::write(&local, "#EXTM3U\n#EXTINF:-1,One\nhttp://s.example.org/1\n").unwrap();

    let mut config = config_in(dir.path());
    config.playlists = vec![local.display().to_string()];

    let report = consolidate(&config, &MemoryFetcher::new()).await.unwrap();

    assert!(report.epg_output.is_none());
    assert_eq!(report.epg.attempted(), 0);
    assert!(config.output.playlist.exists());
    assert!(!config.output.epg.exists());
}
