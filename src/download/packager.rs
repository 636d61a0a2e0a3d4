//! Single EPUB vs. zip bundle.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use tracing::info;
use zip::ZipWriter;
use zip::write::FileOptions;

use super::error::PipelineError;
use super::models::{EPUB_MEDIA_TYPE, GeneratedArtifactSet, ServableResponse, ZIP_MEDIA_TYPE};
use crate::base_system::jnc_url;
use crate::third_party::GenerationError;

const VOLUME_MARKER: &str = "_Volume_";

/// Blocking: writes the zip when more than one file was produced.
pub fn package(
    set: GeneratedArtifactSet,
    source_url: &str,
) -> Result<ServableResponse, PipelineError> {
    let GeneratedArtifactSet { files, workdir } = set;

    match files.as_slice() {
        [] => Err(GenerationError::NotFound(
            "no EPUB files were produced, is the URL correct?".to_string(),
        )
        .into()),
        [single] => {
            let filename = file_name(single)?;
            info!(target: "pipeline", file = %filename, "serving single EPUB");
            Ok(ServableResponse {
                path: single.clone(),
                media_type: EPUB_MEDIA_TYPE,
                filename,
                workdir,
            })
        }
        many => {
            let filename = format!("{}.zip", bundle_name(&many[0], source_url));
            let zip_path = workdir.path().join(&filename);
            write_zip(&zip_path, many)?;
            info!(target: "pipeline", file = %filename, count = many.len(), "serving EPUB bundle");
            Ok(ServableResponse {
                path: zip_path,
                media_type: ZIP_MEDIA_TYPE,
                filename,
                workdir,
            })
        }
    }
}

fn write_zip(zip_path: &Path, files: &[std::path::PathBuf]) -> Result<(), PipelineError> {
    let out = BufWriter::new(File::create(zip_path)?);
    let mut zip = ZipWriter::new(out);
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for path in files {
        zip.start_file(file_name(path)?, options)?;
        let mut f = File::open(path)?;
        io::copy(&mut f, &mut zip)?;
    }

    let mut out = zip.finish()?;
    out.flush()?;
    Ok(())
}

/// `Series_Name_Volume_4.epub` -> `Series_Name`; falls back to the URL slug.
fn bundle_name(first: &Path, source_url: &str) -> String {
    let stem = first
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    if let Some((base, _)) = stem.split_once(VOLUME_MARKER)
        && !base.is_empty()
    {
        return base.to_string();
    }

    jnc_url::slug(source_url)
        .map(str::to_string)
        .unwrap_or_else(|| "epubs".to_string())
}

fn file_name(path: &Path) -> Result<String, PipelineError> {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| PipelineError::Packaging(format!("not a file: {}", path.display())))
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::Read;

    use super::*;
    use crate::base_system::file_cleaner::WorkDir;

    const URL: &str = "https://j-novel.club/series/example";

    fn set_with(root: &Path, names: &[(&str, &[u8])]) -> GeneratedArtifactSet {
        let workdir = WorkDir::create_in(root).unwrap();
        let files = names
            .iter()
            .map(|(name, body)| {
                let p = workdir.path().join(name);
                fs::write(&p, body).unwrap();
                p
            })
            .collect();
        GeneratedArtifactSet { files, workdir }
    }

    #[test]
    fn single_file_is_served_unchanged() {
        let root = tempfile::tempdir().unwrap();
        let set = set_with(root.path(), &[("vol1.epub", b"EPUB-ONE")]);

        let served = package(set, URL).unwrap();
        assert_eq!(served.media_type, EPUB_MEDIA_TYPE);
        assert_eq!(served.filename, "vol1.epub");
        assert_eq!(fs::read(&served.path).unwrap(), b"EPUB-ONE");
    }

    #[test]
    fn several_files_become_one_zip() {
        let root = tempfile::tempdir().unwrap();
        let set = set_with(
            root.path(),
            &[("vol1.epub", b"first"), ("vol2.epub", b"second")],
        );

        let served = package(set, URL).unwrap();
        assert_eq!(served.media_type, ZIP_MEDIA_TYPE);
        assert_eq!(served.filename, "example.zip");
        assert!(served.path.starts_with(served.workdir.path()));

        let mut zip = zip::ZipArchive::new(File::open(&served.path).unwrap()).unwrap();
        let mut names: Vec<String> = zip.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(names, ["vol1.epub", "vol2.epub"]);

        let mut body = String::new();
        zip.by_name("vol2.epub")
            .unwrap()
            .read_to_string(&mut body)
            .unwrap();
        assert_eq!(body, "second");
    }

    #[test]
    fn zip_is_named_after_the_series() {
        let root = tempfile::tempdir().unwrap();
        let set = set_with(
            root.path(),
            &[
                ("My_Series_Volume_4.epub", b"4"),
                ("My_Series_Volume_5.epub", b"5"),
            ],
        );
        assert_eq!(package(set, URL).unwrap().filename, "My_Series.zip");
    }

    #[test]
    fn empty_set_is_not_found_and_cleaned() {
        let root = tempfile::tempdir().unwrap();
        let set = set_with(root.path(), &[]);
        let dir = set.workdir.path().to_path_buf();

        let err = package(set, URL).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Generation(GenerationError::NotFound(_))
        ));
        assert!(!dir.exists());
    }

    #[test]
    fn dropping_the_response_removes_everything() {
        let root = tempfile::tempdir().unwrap();
        let set = set_with(root.path(), &[("a.epub", b"a"), ("b.epub", b"b")]);

        let served = package(set, URL).unwrap();
        let dir = served.workdir.path().to_path_buf();
        assert!(served.path.exists());
        drop(served);

        assert!(!dir.exists());
        assert!(crate::base_system::file_cleaner::is_empty_dir(root.path()).unwrap());
    }
}
