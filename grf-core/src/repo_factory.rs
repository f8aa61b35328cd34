use crate::error::Result;
use crate::repo::{GrfArchive, OpenParams};
use crate::repo_fs::FsArchive;

#[derive(Clone, Copy, Debug, Default)]
pub enum Backend {
    #[default]
    Fs,
}

pub fn open_repo(backend: Backend, p: &OpenParams) -> Result<Box<dyn GrfArchive>> {
    match backend {
        Backend::Fs => Ok(Box::new(FsArchive::open(p)?)),
    }
}

pub fn create_repo(backend: Backend, p: &OpenParams) -> Result<Box<dyn GrfArchive>> {
    match backend {
        Backend::Fs => Ok(Box::new(FsArchive::create(p)?)),
    }
}
