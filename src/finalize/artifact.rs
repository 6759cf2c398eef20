// src/finalize/artifact.rs

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Context;
use tracing::{debug, warn};

use crate::config::model::SettingsSection;
use crate::errors::Result;
use crate::finalize::Finalizer;
use crate::job::state::Job;
use crate::types::JobStatus;

const VECTOR_EXTS: &[&str] = &["ps", "eps"];
const RASTER_EXTS: &[&str] = &["gif", "png", "jpg", "jpeg"];
const FIGURE_DIRS: &[&str] = &["model/PS", "obs/PS"];
const NETCDF_DIRS: &[&str] = &["model/netCDF", "obs/netCDF"];

/// Production finalizer: builds the job's report page, converts figures to a
/// web-displayable format, copies docs and premade figures, and trims
/// intermediate output.
///
/// Runs after the batch join, so the synchronous `convert` invocations don't
/// stall any job.
pub struct ArtifactFinalizer {
    case_name: String,
    convert_flags: String,
    convert_output_fmt: String,
    save_ps: bool,
    save_nc: bool,
}

impl ArtifactFinalizer {
    pub fn from_settings(settings: &SettingsSection) -> Self {
        Self {
            case_name: settings.case_name.clone(),
            convert_flags: settings.convert_flags.clone(),
            convert_output_fmt: settings.convert_output_fmt.clone(),
            save_ps: settings.save_ps,
            save_nc: settings.save_nc,
        }
    }

    /// Copy the job's HTML template into the work dir with the case name
    /// substituted, and link it from the batch index. Jobs without a
    /// template are skipped quietly.
    fn write_job_page(&self, job: &Job) -> Result<()> {
        let template = job.dirs.code_dir.join(format!("{}.html", job.spec.name));
        if !template.is_file() {
            debug!(job = %job.spec.name, "no report template; skipping page generation");
            return Ok(());
        }

        let contents = fs::read_to_string(&template)
            .with_context(|| format!("reading report template {:?}", template))?;
        let page = job.dirs.work_dir.join(format!("{}.html", job.spec.name));
        fs::write(&page, contents.replace("casename", &self.case_name))
            .with_context(|| format!("writing report page {:?}", page))?;

        self.link_from_index(job)?;
        Ok(())
    }

    /// Append a link line to the case-level index.html unless the job is
    /// already listed there.
    fn link_from_index(&self, job: &Job) -> Result<()> {
        let index = match job.dirs.work_dir.parent() {
            Some(case_dir) => case_dir.join("index.html"),
            None => return Ok(()),
        };

        let existing = fs::read_to_string(&index).unwrap_or_default();
        if existing.contains(&job.spec.name) {
            return Ok(());
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&index)
            .with_context(|| format!("opening index {:?}", index))?;
        writeln!(
            file,
            "<H3><font color=navy>{} <A HREF=\"{}/{}.html\">plots</A></H3>",
            job.spec.description, job.spec.name, job.spec.name
        )
        .with_context(|| format!("appending to index {:?}", index))?;
        Ok(())
    }

    /// Convert PS/EPS figures to the configured bitmap format, writing the
    /// result one level above the vector-figure dir (`model/PS/x.ps` becomes
    /// `model/x.png`), which is where the report pages link to.
    fn convert_figures(&self, job: &Job) {
        for dir in FIGURE_DIRS {
            let dir = job.dirs.work_dir.join(dir);
            for figure in files_with_extensions(&dir, VECTOR_EXTS) {
                let Some(stem) = figure.file_stem() else { continue };
                let Some(parent) = dir.parent() else { continue };
                let mut target = parent.join(stem);
                target.set_extension(&self.convert_output_fmt);

                let command = format!(
                    "convert {} {} {}",
                    self.convert_flags,
                    figure.to_string_lossy(),
                    target.to_string_lossy()
                );
                match Command::new("bash").arg("-c").arg(&command).status() {
                    Ok(status) if status.success() => {}
                    Ok(status) => warn!(
                        job = %job.spec.name,
                        figure = ?figure,
                        exit = status.code().unwrap_or(-1),
                        "figure conversion failed"
                    ),
                    Err(e) => warn!(
                        job = %job.spec.name,
                        figure = ?figure,
                        error = %e,
                        "could not run figure conversion"
                    ),
                }
            }
        }
    }

    /// Copy PDF documentation from the code dir and premade raster figures
    /// from the obs data dir into the output tree.
    fn copy_static_files(&self, job: &Job) {
        for doc in files_with_extensions(&job.dirs.code_dir, &["pdf"]) {
            copy_into(&doc, &job.dirs.work_dir);
        }
        let obs_out = job.dirs.work_dir.join("obs");
        for figure in files_with_extensions(&job.dirs.obs_data_dir, RASTER_EXTS) {
            copy_into(&figure, &obs_out);
        }
    }

    fn cleanup(&self, job: &Job) {
        if !self.save_ps {
            for dir in FIGURE_DIRS {
                remove_dir_if_present(&job.dirs.work_dir.join(dir));
            }
        }
        if !self.save_nc {
            for dir in NETCDF_DIRS {
                remove_dir_if_present(&job.dirs.work_dir.join(dir));
            }
        }
    }
}

impl Finalizer for ArtifactFinalizer {
    fn finalize(&self, job: &Job, status: JobStatus) -> Result<()> {
        debug!(job = %job.spec.name, %status, "finalizing job output");
        self.write_job_page(job)?;
        self.convert_figures(job);
        self.copy_static_files(job);
        self.cleanup(job);
        Ok(())
    }
}

fn files_with_extensions(dir: &Path, exts: &[&str]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return files,
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| exts.iter().any(|x| x.eq_ignore_ascii_case(e)));
        if matches && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    files
}

fn copy_into(file: &Path, dir: &Path) {
    let Some(name) = file.file_name() else { return };
    if let Err(e) = fs::copy(file, dir.join(name)) {
        warn!(file = ?file, error = %e, "could not copy file to output");
    }
}

fn remove_dir_if_present(dir: &Path) {
    if dir.is_dir() {
        if let Err(e) = fs::remove_dir_all(dir) {
            warn!(dir = ?dir, error = %e, "could not remove directory");
        }
    }
}
