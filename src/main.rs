fn main() {
    std::process::exit(crop_diagnosis_uploader_lib::run());
}
