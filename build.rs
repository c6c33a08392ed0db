use std::io::ErrorKind;
use std::path::Path;
use std::{fs, io};

const OUT_DIR: &str = "./generated/";
const PROTO_DIR: &str = "./protos/";
// Node agent schema. Commands and replies cross it as JSON documents.
const PROTOS: &[&str] = &["./protos/datastore.proto"];

fn main() -> io::Result<()> {
    for proto in PROTOS {
        println!("cargo:rerun-if-changed={}", proto);
    }

    create_out_dir(OUT_DIR)?;
    tonic_build::configure()
        .build_client(true)
        .build_server(true)
        .out_dir(OUT_DIR)
        .compile(PROTOS, &[PROTO_DIR])
}

fn create_out_dir<P: AsRef<Path>>(path: P) -> io::Result<()> {
    match fs::create_dir_all(path) {
        Err(e) if e.kind() != ErrorKind::AlreadyExists => Err(e),
        _ => Ok(()),
    }
}
