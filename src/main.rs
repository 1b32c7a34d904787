mod demo_scenes;

use demo_scenes::LakesideScene;

fn main() {
    if let Err(err) = wgpu_lakeside::run(LakesideScene::default()) {
        eprintln!("Application error: {err}");
    }
}
