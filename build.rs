fn main() {
    println!("cargo:rerun-if-changed=src/services/fault_guard.c");

    cc::Build::new()
        .file("src/services/fault_guard.c")
        .warnings(true)
        .compile("decoda_scc_fault_guard");
}
