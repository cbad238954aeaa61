use std::path::PathBuf;

use glam::{UVec2, Vec3};

/// Command-line configuration. Flags follow the scene tooling convention of
/// a single dash and a capitalised name; unknown flags are reported and
/// skipped rather than aborting the run.
#[derive(Debug, Default)]
pub struct Options {
    pub scene: Option<PathBuf>,
    pub skybox: Option<PathBuf>,
    pub camera_position: Option<Vec3>,
    pub camera_direction: Option<Vec3>,
    pub output_file: Option<PathBuf>,
    pub resolution: Option<UVec2>,
}

fn take_f32(args: &mut impl Iterator<Item = String>, flag: &str) -> Option<f32> {
    match args.next().map(|value| value.parse()) {
        Some(Ok(value)) => Some(value),
        _ => {
            log::warn!("{flag} expects numeric values");
            None
        }
    }
}

fn take_u32(args: &mut impl Iterator<Item = String>, flag: &str) -> Option<u32> {
    match args.next().map(|value| value.parse()) {
        Some(Ok(value)) => Some(value),
        _ => {
            log::warn!("{flag} expects integer values");
            None
        }
    }
}

fn take_vec3(args: &mut impl Iterator<Item = String>, flag: &str) -> Option<Vec3> {
    Some(Vec3::new(
        take_f32(args, flag)?,
        take_f32(args, flag)?,
        take_f32(args, flag)?,
    ))
}

impl Options {
    pub fn parse(args: impl IntoIterator<Item = String>) -> Options {
        let mut options = Options::default();
        let mut args = args.into_iter();

        while let Some(flag) = args.next() {
            match flag.as_str() {
                "-Skybox" => {
                    options.skybox = args.next().map(PathBuf::from);
                }
                "-CameraPosition" => {
                    options.camera_position = take_vec3(&mut args, "-CameraPosition");
                }
                "-CameraDirection" => {
                    options.camera_direction = take_vec3(&mut args, "-CameraDirection");
                }
                "-Scene" => {
                    options.scene = args.next().map(PathBuf::from);
                }
                "-OutputFile" => {
                    options.output_file = args.next().map(PathBuf::from);
                }
                "-Resolution" => {
                    let width = take_u32(&mut args, "-Resolution");
                    let height = take_u32(&mut args, "-Resolution");
                    if let (Some(width), Some(height)) = (width, height) {
                        options.resolution = Some(UVec2::new(width, height));
                    }
                }
                unknown => {
                    log::warn!("unrecognised command {unknown}");
                }
            }
        }

        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Options {
        Options::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn parses_all_known_flags() {
        let options = parse(&[
            "-Scene",
            "scenes/cornell.json",
            "-OutputFile",
            "out.jpg",
            "-CameraPosition",
            "1",
            "2",
            "3",
            "-CameraDirection",
            "0",
            "0",
            "1",
            "-Resolution",
            "640",
            "480",
            "-Skybox",
            "sky.png",
        ]);

        assert_eq!(options.scene, Some(PathBuf::from("scenes/cornell.json")));
        assert_eq!(options.output_file, Some(PathBuf::from("out.jpg")));
        assert_eq!(options.camera_position, Some(Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(options.camera_direction, Some(Vec3::new(0.0, 0.0, 1.0)));
        assert_eq!(options.resolution, Some(UVec2::new(640, 480)));
        assert_eq!(options.skybox, Some(PathBuf::from("sky.png")));
    }

    #[test]
    fn unknown_flags_are_skipped() {
        let options = parse(&["-Nonsense", "-Scene", "a.json"]);
        assert_eq!(options.scene, Some(PathBuf::from("a.json")));
    }

    #[test]
    fn malformed_numbers_leave_the_option_unset() {
        let options = parse(&["-Resolution", "abc", "480"]);
        assert_eq!(options.resolution, None);
    }

    #[test]
    fn empty_arguments_parse_to_defaults() {
        let options = parse(&[]);
        assert!(options.scene.is_none());
        assert!(options.resolution.is_none());
    }
}
