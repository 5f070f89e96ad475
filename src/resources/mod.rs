//! Things the provisioner puts in place: packages and symlinks.
pub mod helpers {
    //! Shared filesystem helpers for resource implementations.
    pub mod fs;
}
pub mod package;
pub mod symlink;
