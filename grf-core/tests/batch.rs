use std::fs;
use std::path::Path;

use grf_core::codec::{CodecId, encode_payload};
use grf_core::domain::StoredBlob;
use grf_core::scan::{scan_directory, scan_directory_with};
use grf_core::select::resolve_selection;
use grf_core::{
    Backend, BatchStatus, EucKr, ExtractNaming, GrfArchive, GrfError, NoProgress, OpenParams,
    Progress, RepackPolicy, StorageFlags, VirtualTree, add_directory, add_many, create_repo,
    delete_many, extract_all, extract_many, merge_file, open_repo, repack,
};

fn write(path: &Path, content: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn sample_tree(root: &Path) {
    write(&root.join("a.txt"), b"alpha");
    write(&root.join("sub").join("b.txt"), b"bravo bravo");
}

fn stop_after(n: u64) -> impl FnMut(&Progress) -> bool {
    move |p: &Progress| p.completed < n
}

#[test]
fn scan_maps_nested_directories_under_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("root");
    sample_tree(&root);

    let found = scan_directory(&root, "data\\", &EucKr).unwrap();
    let pairs: Vec<_> = found
        .iter()
        .map(|e| (e.source_path.clone(), e.virtual_path.as_str()))
        .collect();
    assert_eq!(
        pairs,
        vec![
            (root.join("a.txt"), "data\\a.txt"),
            (root.join("sub").join("b.txt"), "data\\sub\\b.txt"),
        ]
    );
    assert_eq!(found[1].native_path, b"data\\sub\\b.txt");

    let unprefixed = scan_directory(&root, "data", &EucKr).unwrap();
    assert_eq!(unprefixed, found);
}

#[test]
fn unclassifiable_name_aborts_the_whole_scan() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("root");
    sample_tree(&root);
    write(&root.join("zz").join("🎉.txt"), b"party");

    match scan_directory(&root, "", &EucKr) {
        Err(GrfError::Encoding { path }) => assert!(path.ends_with("🎉.txt")),
        other => panic!("expected encoding error, got {other:?}"),
    }
}

#[cfg(unix)]
#[test]
fn legacy_names_keep_their_bytes() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("root");
    // "한글" in EUC-KR, not valid UTF-8
    write(&root.join(OsStr::from_bytes(&[0xC7, 0xD1, 0xB1, 0xDB])), b"x");

    let found = scan_directory(&root, "", &EucKr).unwrap();
    assert_eq!(found[0].native_path, vec![0xC7, 0xD1, 0xB1, 0xDB]);
    assert_eq!(found[0].virtual_path, "한글");
}

#[test]
fn unicode_names_are_transcoded() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("root");
    write(&root.join("한글.txt"), b"x");

    let found = scan_directory(&root, "", &EucKr).unwrap();
    assert_eq!(found[0].native_path, b"\xC7\xD1\xB1\xDB.txt");
    assert_eq!(found[0].virtual_path, "한글.txt");
}

#[test]
fn cancelled_add_keeps_processed_units() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("root");
    for i in 0..5 {
        write(&root.join(format!("f{i}.txt")), format!("file {i}").as_bytes());
    }
    let params = OpenParams::new(dir.path().join("a.grf"));
    let mut arc = create_repo(Backend::Fs, &params).unwrap();

    let report = add_directory(arc.as_mut(), &root, "", &EucKr, &mut stop_after(2)).unwrap();
    assert_eq!(report.status, BatchStatus::Cancelled);
    assert_eq!((report.completed, report.total), (2, 5));
    drop(arc);

    let arc = open_repo(Backend::Fs, &params).unwrap();
    assert_eq!(arc.file_count(), 2);
}

#[test]
fn missing_source_commits_what_came_before() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("root");
    sample_tree(&root);
    let mut files = scan_directory(&root, "", &EucKr).unwrap();
    fs::remove_file(&files[1].source_path).unwrap();
    files.push(files[0].clone());

    let params = OpenParams::new(dir.path().join("a.grf"));
    let mut arc = create_repo(Backend::Fs, &params).unwrap();
    match add_many(arc.as_mut(), &files, &mut NoProgress) {
        Err(GrfError::Ingest { committed, .. }) => assert_eq!(committed, 1),
        other => panic!("expected ingest error, got {other:?}"),
    }
    drop(arc);
    assert_eq!(open_repo(Backend::Fs, &params).unwrap().file_count(), 1);
}

#[test]
fn delete_selection_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("root");
    sample_tree(&root);
    let params = OpenParams::new(dir.path().join("a.grf"));
    let mut arc = create_repo(Backend::Fs, &params).unwrap();
    add_directory(arc.as_mut(), &root, "data", &EucKr, &mut NoProgress).unwrap();

    let tree = VirtualTree::from_archive(arc.as_ref(), &EucKr);
    let data = tree.find("data").unwrap();
    let sub_b = tree.find("data\\sub\\b.txt").unwrap();
    // b.txt is selected twice.
    let ids = resolve_selection(&tree, &[data, sub_b]);
    assert_eq!(ids.len(), 3);

    let report = delete_many(arc.as_mut(), &ids, &EucKr, &mut NoProgress).unwrap();
    assert_eq!(report.completed, 3);
    assert_eq!(arc.file_count(), 0);
    let again = delete_many(arc.as_mut(), &ids, &EucKr, &mut NoProgress).unwrap();
    assert_eq!(again.status, BatchStatus::Completed);

    drop(arc);
    assert_eq!(open_repo(Backend::Fs, &params).unwrap().file_count(), 0);
}

#[test]
fn extract_roundtrips_content_and_skips_unsafe_paths() {
    let dir = tempfile::tempdir().unwrap();
    let params = OpenParams::new(dir.path().join("a.grf"));
    let mut arc = create_repo(Backend::Fs, &params).unwrap();
    arc.add_entry(b"data\\x.txt", &mut &b"ten bytes!"[..]).unwrap();
    arc.add_entry(b"data\\..\\..\\evil.txt", &mut &b"nope"[..]).unwrap();
    arc.add_entry(b"data\\sub\\y.txt", &mut &b"twenty bytes of text"[..]).unwrap();
    arc.save().unwrap();

    let out = dir.path().join("out");
    let report = extract_all(arc.as_ref(), &out, ExtractNaming::Unicode, &EucKr, &mut NoProgress)
        .unwrap();
    assert_eq!((report.completed, report.skipped), (3, 1));
    assert_eq!(fs::read(out.join("data").join("x.txt")).unwrap(), b"ten bytes!");
    assert_eq!(
        fs::read(out.join("data").join("sub").join("y.txt")).unwrap(),
        b"twenty bytes of text"
    );
    assert!(!dir.path().join("evil.txt").exists());
}

#[test]
fn extract_rejects_stale_ids_up_front() {
    let dir = tempfile::tempdir().unwrap();
    let params = OpenParams::new(dir.path().join("a.grf"));
    let mut arc = create_repo(Backend::Fs, &params).unwrap();
    let id = arc.add_entry(b"a.txt", &mut &b"a"[..]).unwrap();
    arc.delete_entry(id).unwrap();

    let out = dir.path().join("out");
    let res = extract_many(arc.as_ref(), &[id], &out, ExtractNaming::Unicode, &EucKr, &mut NoProgress);
    assert!(matches!(res, Err(GrfError::NotFound(missing)) if missing == id));
    assert!(!out.exists());
}

#[test]
fn merge_lets_the_source_win() {
    let dir = tempfile::tempdir().unwrap();
    let src_params = OpenParams::new(dir.path().join("src.grf"));
    let mut src = create_repo(Backend::Fs, &src_params).unwrap();
    src.add_entry(b"shared.txt", &mut &b"from source"[..]).unwrap();
    src.add_entry(b"only-src.txt", &mut &b"s"[..]).unwrap();
    src.save().unwrap();
    drop(src);

    let dst_params = OpenParams::new(dir.path().join("dst.grf"));
    let mut dst = create_repo(Backend::Fs, &dst_params).unwrap();
    dst.add_entry(b"shared.txt", &mut &b"from destination"[..]).unwrap();
    dst.add_entry(b"only-dst.txt", &mut &b"d"[..]).unwrap();

    let report = merge_file(
        dst.as_mut(),
        &src_params.archive_path,
        RepackPolicy::MoveOnly,
        &EucKr,
        &mut NoProgress,
    )
    .unwrap();
    assert_eq!((report.completed, report.total), (2, 2));
    drop(dst);

    let dst = open_repo(Backend::Fs, &dst_params).unwrap();
    assert_eq!(dst.file_count(), 3);
    let shared = dst
        .entries()
        .into_iter()
        .find(|e| e.virtual_path == b"shared.txt")
        .unwrap();
    let mut body = Vec::new();
    dst.read_entry(shared.id, &mut body).unwrap();
    assert_eq!(body, b"from source");
}

#[test]
fn merging_garbage_is_a_format_error() {
    let dir = tempfile::tempdir().unwrap();
    let bogus = dir.path().join("bogus.grf");
    fs::write(&bogus, b"definitely not an archive").unwrap();
    let params = OpenParams::new(dir.path().join("dst.grf"));
    let mut dst = create_repo(Backend::Fs, &params).unwrap();

    let res = merge_file(dst.as_mut(), &bogus, RepackPolicy::MoveOnly, &EucKr, &mut NoProgress);
    assert!(matches!(res, Err(GrfError::Format(_))));
    assert_eq!(dst.file_count(), 0);
}

#[test]
fn repack_reclaims_and_reports() {
    let dir = tempfile::tempdir().unwrap();
    let params = OpenParams::new(dir.path().join("a.grf"));
    let mut arc = create_repo(Backend::Fs, &params).unwrap();
    arc.add_entry(b"a.txt", &mut &vec![7u8; 4096][..]).unwrap();
    arc.add_entry(b"a.txt", &mut &vec![8u8; 4096][..]).unwrap();
    arc.add_entry(b"b.txt", &mut &b"b"[..]).unwrap();
    arc.save().unwrap();
    assert!(arc.wasted_space() > 0);

    let mut seen = Vec::new();
    let mut sink = |p: &Progress| {
        seen.push(p.label.clone());
        true
    };
    let report = repack(arc.as_mut(), RepackPolicy::Recompress, &EucKr, &mut sink).unwrap();
    assert_eq!(report.status, BatchStatus::Completed);
    // Replacing a.txt gave it a newer id than b.txt.
    assert_eq!(seen, vec!["", "b.txt", "a.txt"]);
    assert_eq!(arc.wasted_space(), 0);
    drop(arc);

    let arc = open_repo(Backend::Fs, &params).unwrap();
    let a = arc.entries().into_iter().find(|e| e.virtual_path == b"a.txt").unwrap();
    let mut body = Vec::new();
    arc.read_entry(a.id, &mut body).unwrap();
    assert_eq!(body, vec![8u8; 4096]);
}

fn archive_with(params: &OpenParams, names: &[&str]) -> Box<dyn GrfArchive> {
    let mut arc = create_repo(Backend::Fs, params).unwrap();
    for name in names {
        arc.add_entry(name.as_bytes(), &mut name.as_bytes()).unwrap();
    }
    arc.save().unwrap();
    arc
}

#[test]
fn scan_reports_each_discovery() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("root");
    sample_tree(&root);

    let mut seen = Vec::new();
    let mut sink = |p: &Progress| {
        seen.push((p.completed, p.total, p.label.clone()));
        true
    };
    let found = scan_directory_with(&root, "data", &EucKr, &mut sink).unwrap().unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(
        seen,
        vec![
            (0, 0, "data\\a.txt".to_string()),
            (0, 0, "data\\sub\\b.txt".to_string()),
        ]
    );
}

#[test]
fn cancelling_the_scan_adds_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("root");
    sample_tree(&root);
    let params = OpenParams::new(dir.path().join("a.grf"));
    let mut arc = create_repo(Backend::Fs, &params).unwrap();

    let mut during_scan = |p: &Progress| p.total > 0;
    let report = add_directory(arc.as_mut(), &root, "", &EucKr, &mut during_scan).unwrap();
    assert_eq!(report.status, BatchStatus::Cancelled);
    assert_eq!((report.completed, report.total), (0, 0));
    assert_eq!(arc.file_count(), 0);
}

#[test]
fn cancelled_merge_keeps_merged_units() {
    let dir = tempfile::tempdir().unwrap();
    let src_params = OpenParams::new(dir.path().join("src.grf"));
    drop(archive_with(&src_params, &["a", "b", "c"]));
    let dst_params = OpenParams::new(dir.path().join("dst.grf"));
    let mut dst = create_repo(Backend::Fs, &dst_params).unwrap();

    let report = merge_file(
        dst.as_mut(),
        &src_params.archive_path,
        RepackPolicy::MoveOnly,
        &EucKr,
        &mut stop_after(2),
    )
    .unwrap();
    assert_eq!(report.status, BatchStatus::Cancelled);
    assert_eq!((report.completed, report.total), (2, 3));
    drop(dst);

    let dst = open_repo(Backend::Fs, &dst_params).unwrap();
    let paths: Vec<_> = dst.entries().into_iter().map(|e| e.virtual_path).collect();
    assert_eq!(paths, vec![b"a".to_vec(), b"b".to_vec()]);
}

#[test]
fn failed_merge_saves_what_it_merged() {
    let dir = tempfile::tempdir().unwrap();
    let src_params = OpenParams::new(dir.path().join("src.grf"));
    let mut src = create_repo(Backend::Fs, &src_params).unwrap();
    src.add_entry(b"good.txt", &mut &b"good"[..]).unwrap();
    src.add_stored(
        b"bad.txt",
        StoredBlob {
            data: b"not a zstd frame".to_vec(),
            size: 16,
            codec: CodecId::Zstd,
            flags: StorageFlags::FILE,
        },
    )
    .unwrap();
    src.save().unwrap();
    drop(src);

    let dst_params = OpenParams::new(dir.path().join("dst.grf"));
    let mut dst = create_repo(Backend::Fs, &dst_params).unwrap();
    let mut reported = 0;
    let mut sink = |p: &Progress| {
        reported = p.completed;
        true
    };
    let res = merge_file(
        dst.as_mut(),
        &src_params.archive_path,
        RepackPolicy::Recompress,
        &EucKr,
        &mut sink,
    );
    match res {
        Err(GrfError::Interrupted { committed, .. }) => assert_eq!(committed, 1),
        other => panic!("expected interrupted merge, got {other:?}"),
    }
    assert_eq!(reported, 1);
    drop(dst);

    let dst = open_repo(Backend::Fs, &dst_params).unwrap();
    assert_eq!(dst.file_count(), 1);
    assert_eq!(dst.entries()[0].virtual_path, b"good.txt");
}

#[test]
fn cancelled_delete_keeps_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let params = OpenParams::new(dir.path().join("a.grf"));
    let mut arc = archive_with(&params, &["a", "b", "c"]);
    let ids: Vec<_> = arc.entries().into_iter().map(|e| e.id).collect();

    let report = delete_many(arc.as_mut(), &ids, &EucKr, &mut stop_after(1)).unwrap();
    assert_eq!(report.status, BatchStatus::Cancelled);
    assert_eq!((report.completed, report.total), (1, 3));
    drop(arc);

    let arc = open_repo(Backend::Fs, &params).unwrap();
    let paths: Vec<_> = arc.entries().into_iter().map(|e| e.virtual_path).collect();
    assert_eq!(paths, vec![b"b".to_vec(), b"c".to_vec()]);
}

#[test]
fn cancelled_extract_leaves_written_files() {
    let dir = tempfile::tempdir().unwrap();
    let params = OpenParams::new(dir.path().join("a.grf"));
    let arc = archive_with(&params, &["a", "b", "c"]);
    let ids: Vec<_> = arc.entries().into_iter().map(|e| e.id).collect();

    let out = dir.path().join("out");
    let report = extract_many(
        arc.as_ref(),
        &ids,
        &out,
        ExtractNaming::Unicode,
        &EucKr,
        &mut stop_after(2),
    )
    .unwrap();
    assert_eq!(report.status, BatchStatus::Cancelled);
    assert_eq!((report.completed, report.total), (2, 3));
    assert_eq!(fs::read(out.join("a")).unwrap(), b"a");
    assert_eq!(fs::read(out.join("b")).unwrap(), b"b");
    assert!(!out.join("c").exists());
}

#[test]
fn unwritable_destination_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let params = OpenParams::new(dir.path().join("a.grf"));
    let arc = archive_with(&params, &["a.txt", "b.txt"]);
    let out = dir.path().join("out");
    // A directory where the file should go.
    fs::create_dir_all(out.join("a.txt")).unwrap();

    let report =
        extract_all(arc.as_ref(), &out, ExtractNaming::Unicode, &EucKr, &mut NoProgress).unwrap();
    assert_eq!(report.status, BatchStatus::Completed);
    assert_eq!((report.completed, report.skipped), (2, 1));
    assert!(out.join("a.txt").is_dir());
    assert_eq!(fs::read(out.join("b.txt")).unwrap(), b"b.txt");
}

#[test]
fn size_mismatch_is_skipped_and_removed() {
    let dir = tempfile::tempdir().unwrap();
    let params = OpenParams::new(dir.path().join("a.grf"));
    let mut arc = create_repo(Backend::Fs, &params).unwrap();
    let plain = b"hello ".repeat(100);
    let (codec, data) = encode_payload(&plain, 5).unwrap();
    assert_eq!(codec, CodecId::Zstd);
    arc.add_stored(
        b"short.txt",
        StoredBlob {
            data,
            size: plain.len() as u64 + 1,
            codec,
            flags: StorageFlags::FILE,
        },
    )
    .unwrap();
    arc.add_entry(b"ok.txt", &mut &b"fine"[..]).unwrap();

    let out = dir.path().join("out");
    let report =
        extract_all(arc.as_ref(), &out, ExtractNaming::Unicode, &EucKr, &mut NoProgress).unwrap();
    assert_eq!((report.completed, report.skipped), (2, 1));
    assert!(!out.join("short.txt").exists());
    assert_eq!(fs::read(out.join("ok.txt")).unwrap(), b"fine");
}
