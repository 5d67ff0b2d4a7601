mod common;
mod identity;
mod resources;
mod workspace;
