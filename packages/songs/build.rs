use std::env;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

fn main() {
    let out_dir = env::var("OUT_DIR").unwrap();
    let dest_path = Path::new(&out_dir).join("songs.rs");

    let mut code = String::new();
    code.push_str("/// Embedded song library files\n");
    code.push_str("pub static SONG_SOURCES: &[(&str, &str)] = &[\n");

    let library_dir = Path::new("library");

    if library_dir.exists() {
        for entry in WalkDir::new(library_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map_or(false, |ext| ext == "yaml"))
        {
            let path = entry.path();
            let relative_path = path.strip_prefix(library_dir).unwrap();
            let name = relative_path.with_extension("");

            if let Ok(content) = fs::read_to_string(path) {
                code.push_str(&format!(
                    "    ({:?}, {:?}),\n",
                    name.to_string_lossy(),
                    content
                ));
            }
        }
    }

    code.push_str("];\n");

    fs::write(&dest_path, code).unwrap();

    println!("cargo:rerun-if-changed=library");
}
