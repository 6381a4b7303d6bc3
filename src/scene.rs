use std::time::{Duration, Instant};

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::camera::Camera;
use crate::cube::Cube;
use crate::device::{Device, RenderError};
use crate::input::{CanvasGeometry, PointerEvent, PointerKind};
use crate::shader::{Shader, ShaderKind, U_LIGHT_POS, U_OFF_SCREEN};

/// Cubes spawn on an x span of this many units and fall toward row
/// `GRID_SIZE` of the warped grid.
pub const GRID_SIZE: u32 = 15;

#[bon::builder]
#[derive(Debug, Clone)]
pub struct SceneOptions {
    #[builder(default = 60.0)]
    pub field_of_view: f32,
    #[builder(default = GRID_SIZE)]
    pub grid_size: u32,
    #[builder(default = 0.1)]
    pub near: f32,
    #[builder(default = 100.0)]
    pub far: f32,
    /// Seeds the spawn rng; `None` seeds from entropy.
    pub seed: Option<u64>,
    #[builder(default = 5)]
    pub min_spawn_frequency: u32,
    #[builder(default = 20)]
    pub max_spawn_frequency: u32,
    #[builder(default = 0.5)]
    pub min_speed: f32,
    #[builder(default = 1.5)]
    pub max_speed: f32,
    /// Fill the paused scene with a checkerboard of cubes on startup.
    #[builder(default = true)]
    pub debug_grid: bool,
}

impl Default for SceneOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// A successful pick: which item sat under the cursor. The host decides what
/// selection means (scoring, removal).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickHit {
    pub index: usize,
    pub id: String,
}

fn compare_colors(pixel: [u8; 4], color_id: [f32; 4]) -> bool {
    color_id[..3]
        .iter()
        .zip(&pixel[..3])
        .all(|(&c, &p)| ((c * 255.0).round() - f32::from(p)).abs() <= 1.0)
}

/// The playing field: camera, falling cubes, spawn scheduling and the
/// color-ID pick pass.
///
/// The scene starts paused. `start(true)` clears the field and spawns the
/// first cube; `tick` draws every frame and advances the simulation at the
/// given resolution while running. Every `frequency` advances a new cube
/// appears and the frequency is re-rolled.
pub struct Scene<D: Device> {
    device: D,
    camera: Camera,
    geometry: CanvasGeometry,
    items: Vec<Cube>,
    pub light: glam::Vec3,
    pause: bool,
    counter: u32,
    frequency: u32,
    last_advance: Instant,
    next_color_id: u32,
    rng: StdRng,
    options: SceneOptions,
}

impl<D: Device> Scene<D> {
    pub fn new(
        mut device: D,
        geometry: CanvasGeometry,
        vertex: Shader,
        fragment: Shader,
        options: SceneOptions,
    ) -> Result<Self, RenderError> {
        if vertex.kind() != ShaderKind::Vertex || fragment.kind() != ShaderKind::Fragment {
            return Err(RenderError::ShaderKindMismatch);
        }

        device.create_program(&vertex, &fragment)?;

        let (width, height) = device.surface_size();
        let aspect = if height == 0 {
            1.0
        } else {
            width as f32 / height as f32
        };

        let mut camera = Camera::new();
        camera.setup(
            options.field_of_view,
            aspect,
            options.near,
            options.far,
            options.grid_size as f32,
        );

        let mut rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let frequency = rng.gen_range(options.min_spawn_frequency..=options.max_spawn_frequency);

        let mut scene = Self {
            device,
            camera,
            geometry,
            items: Vec::new(),
            light: glam::Vec3::ZERO,
            pause: true,
            counter: 0,
            frequency,
            last_advance: Instant::now(),
            next_color_id: 1,
            rng,
            options,
        };

        if scene.options.debug_grid {
            scene.debug_fill()?;
        }

        Ok(scene)
    }

    pub fn is_paused(&self) -> bool {
        self.pause
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Starts or stops the game. Either way the field is cleared; starting
    /// with a clean counter spawns the first cube immediately.
    pub fn start(&mut self, enabled: bool) -> Result<(), RenderError> {
        self.pause = !enabled;

        if self.pause && self.counter != 0 {
            self.counter = 0;
        }

        self.clear_scene();

        if !self.pause && self.counter == 0 {
            self.add_random_item()?;
        }

        Ok(())
    }

    /// Draws the scene and, while running, advances the simulation once per
    /// elapsed `resolution`.
    pub fn tick(&mut self, resolution: Duration) -> Result<(), RenderError> {
        self.draw()?;

        if !self.pause && self.last_advance.elapsed() >= resolution {
            self.animate();
            self.last_advance = Instant::now();

            self.counter += 1;
            if self.counter == self.frequency {
                self.add_random_item()?;
                self.counter = 0;
                self.frequency = self
                    .rng
                    .gen_range(self.options.min_spawn_frequency..=self.options.max_spawn_frequency);
                log::debug!("next cube in {} ticks", self.frequency);
            }
        }

        Ok(())
    }

    /// Warps a grid point so the playing field hugs the frustum: columns
    /// spread with the aspect ratio and positions bend toward the screen
    /// edges for wide fields of view.
    pub fn point(&self, x: f32, y: f32, z: f32) -> glam::Vec3 {
        let fov = self.camera.field_of_view();
        let ratio = self.camera.aspect_ratio();

        let k = (90.0 - 0.5 * fov).to_radians().cos();
        let half = 0.5 * self.options.grid_size as f32;

        let dx = (half - x.abs()) * (0.5 - k);
        let dy = (half - y.abs()) * (0.5 - k);

        let fx = if x == 0.0 {
            0.0
        } else {
            ((x - half) / half) * (1.0 - ratio)
        };

        glam::vec3((x + dx) * ratio - fx, y + dy, z)
    }

    /// Spawns a cube at a random column near the top, with a random
    /// quarter-turn orientation and fall speed.
    pub fn add_random_item(&mut self) -> Result<(), RenderError> {
        let gx = self.rng.gen_range(0..=self.options.grid_size);
        let gz = self.rng.gen_range(0..=3u32);
        let rot_x = 90.0 * self.rng.gen_range(0..=4u32) as f32;
        let rot_y = 90.0 * self.rng.gen_range(0..=4u32) as f32;
        let speed = self
            .rng
            .gen_range(self.options.min_speed..=self.options.max_speed);

        let mut cube = Cube::new(&mut self.device, format!("{gx}-0-{gz}"))?;
        cube.move_by(glam::vec3(gx as f32, 0.0, gz as f32))
            .rotate_by(glam::vec3(rot_x, rot_y, 0.0));
        cube.speed = speed;

        self.add_item(cube);
        Ok(())
    }

    /// Inserts a cube, assigning it the next pick color and keeping the
    /// list sorted back to front.
    pub fn add_item(&mut self, mut cube: Cube) {
        cube.color_id = self.next_pick_color();
        self.items.push(cube);
        self.sort_items();
    }

    pub fn remove_item(&mut self, index: usize) {
        if index >= self.items.len() {
            return;
        }

        let mut cube = self.items.remove(index);
        cube.destroy(&mut self.device);
    }

    /// Routes a pointer event; only presses can produce a pick.
    pub fn handle_pointer(&mut self, event: PointerEvent) -> Option<PickHit> {
        match event.kind {
            PointerKind::Press => self.mouse_press(event.x, event.y),
            PointerKind::Release | PointerKind::Move => None,
        }
    }

    /// Reads the pick target under the cursor and matches the color against
    /// the items. A miss returns `None`.
    pub fn mouse_press(&mut self, x: f32, y: f32) -> Option<PickHit> {
        let (sx, sy) = self.geometry.to_surface(x, y);
        let pixel = self.device.read_pixel(sx, sy);

        let index = self
            .items
            .iter()
            .position(|cube| compare_colors(pixel, cube.color_id))?;

        let hit = PickHit {
            index,
            id: self.items[index].id().to_owned(),
        };
        log::debug!("pick at ({sx}, {sy}) hit cube {}", hit.id);
        Some(hit)
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        if width == 0 || height == 0 {
            return Ok(());
        }

        self.device.resize(width, height)?;
        self.geometry.resize(width as f32, height as f32);
        self.camera.resize(width as f32 / height as f32);
        Ok(())
    }

    fn clear_scene(&mut self) {
        for mut cube in self.items.drain(..) {
            cube.destroy(&mut self.device);
        }
    }

    fn sort_items(&mut self) {
        self.items
            .sort_by(|a, b| a.pos().z.total_cmp(&b.pos().z));
    }

    /// Channels step by 4 per id so an 8-bit readback stays outside the
    /// compare tolerance of ±1; id 0 is reserved for the clear color.
    fn next_pick_color(&mut self) -> [f32; 4] {
        let n = self.next_color_id;
        self.next_color_id += 1;

        let channel = |bits: u32| ((bits & 0x3f) << 2) as f32 / 255.0;
        [channel(n), channel(n >> 6), channel(n >> 12), 1.0]
    }

    /// Fills the paused scene with a checkerboard of cubes at depth 3.
    fn debug_fill(&mut self) -> Result<(), RenderError> {
        let grid = self.options.grid_size;

        for i in 0..=grid {
            for j in 0..=grid {
                if (i + j) % 2 == 1 {
                    let target = self.point(i as f32, j as f32, 3.0);
                    let mut cube = Cube::new(&mut self.device, format!("{j}-{i}"))?;
                    cube.move_by(target);
                    self.add_item(cube);
                }
            }
        }

        Ok(())
    }

    /// Two passes over the same items: first flat pick colors into the
    /// off-screen target, then the lit scene into the frame.
    fn draw(&mut self) -> Result<(), RenderError> {
        self.device.begin_frame([0.0, 0.0, 0.0, 1.0]);
        self.device.set_vec3(U_LIGHT_POS, self.light.to_array());

        self.device.set_int(U_OFF_SCREEN, 1);
        self.device.bind_offscreen(true)?;
        self.camera.render(&mut self.device, &self.items)?;
        self.device.bind_offscreen(false)?;

        self.device.set_int(U_OFF_SCREEN, 0);
        self.camera.render(&mut self.device, &self.items)?;

        self.device.end_frame();
        Ok(())
    }

    /// Lets every cube fall by its speed, parking it on the floor row
    /// instead of overshooting.
    fn animate(&mut self) {
        let floor = self.point(0.0, self.options.grid_size as f32, 0.0).y;

        for cube in &mut self.items {
            if cube.pos().y + cube.speed > floor {
                let lift = floor - cube.pos().y;
                cube.move_by(glam::vec3(0.0, lift, 0.0));
            }

            if cube.pos().y < floor {
                cube.move_by(glam::vec3(0.0, cube.speed, 0.0));
            }
        }
    }
}

impl<D: Device> Drop for Scene<D> {
    fn drop(&mut self) {
        self.clear_scene();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::RecordingDevice;

    const TEST_VERT: &str = "void main() {}";
    const TEST_FRAG: &str = "void main() {}";

    fn bare_options() -> SceneOptions {
        SceneOptions::builder().seed(7).debug_grid(false).build()
    }

    fn bare_scene() -> Scene<RecordingDevice> {
        scene_with(RecordingDevice::new(), bare_options())
    }

    fn scene_with(device: RecordingDevice, options: SceneOptions) -> Scene<RecordingDevice> {
        let (width, height) = device.size;
        Scene::new(
            device,
            CanvasGeometry::window(width as f32, height as f32),
            Shader::vertex(TEST_VERT),
            Shader::fragment(TEST_FRAG),
            options,
        )
        .unwrap()
    }

    fn pick_pixel_for(color_id: [f32; 4]) -> [u8; 4] {
        let byte = |c: f32| (c * 255.0).round() as u8;
        [byte(color_id[0]), byte(color_id[1]), byte(color_id[2]), 255]
    }

    #[test]
    fn new_scene_is_paused_with_a_rolled_frequency() {
        let scene = bare_scene();
        assert!(scene.is_paused());
        assert!((5..=20).contains(&scene.frequency));
        assert!(scene.device.program_created);
        assert!(scene.items.is_empty());
    }

    #[test]
    fn shader_kinds_are_validated() {
        let result = Scene::new(
            RecordingDevice::new(),
            CanvasGeometry::window(300.0, 300.0),
            Shader::fragment(TEST_FRAG),
            Shader::fragment(TEST_FRAG),
            bare_options(),
        );
        assert!(matches!(result, Err(RenderError::ShaderKindMismatch)));
    }

    #[test]
    fn start_spawns_one_cube_and_stop_clears_everything() {
        let mut scene = bare_scene();

        scene.start(true).unwrap();
        assert!(!scene.is_paused());
        assert_eq!(scene.items.len(), 1);
        assert_eq!(scene.device.live_buffers.len(), 4);

        let id = scene.items[0].id().to_owned();
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[1], "0");

        let speed = scene.items[0].speed;
        assert!((0.5..=1.5).contains(&speed));

        scene.start(false).unwrap();
        assert!(scene.is_paused());
        assert!(scene.items.is_empty());
        assert!(scene.device.live_buffers.is_empty());
        assert_eq!(scene.device.deleted_buffers.len(), 4);
    }

    #[test]
    fn restart_with_a_dirty_counter_spawns_nothing() {
        let mut scene = bare_scene();
        scene.start(true).unwrap();
        scene.counter = 3;

        scene.start(true).unwrap();
        assert!(!scene.is_paused());
        // The field is cleared but no cube spawns until the counter
        // next wraps.
        assert!(scene.items.is_empty());
        assert_eq!(scene.counter, 3);
    }

    #[test]
    fn a_cube_spawns_every_frequency_ticks() {
        let mut scene = bare_scene();
        scene.start(true).unwrap();
        assert_eq!(scene.items.len(), 1);

        let first = scene.frequency;
        for _ in 0..first {
            scene.tick(Duration::ZERO).unwrap();
        }
        assert_eq!(scene.items.len(), 2);
        assert_eq!(scene.counter, 0);

        let second = scene.frequency;
        assert!((5..=20).contains(&second));
        for _ in 0..second {
            scene.tick(Duration::ZERO).unwrap();
        }
        assert_eq!(scene.items.len(), 3);
    }

    #[test]
    fn tick_draws_the_pick_pass_before_the_visible_pass() {
        let mut scene = bare_scene();
        scene.start(true).unwrap();

        scene.tick(Duration::from_secs(3600)).unwrap();

        assert_eq!(scene.device.frames_begun, 1);
        assert_eq!(scene.device.frames_ended, 1);
        assert_eq!(scene.device.off_screen_flags, vec![1, 0]);
        assert!(scene.device.vec3s.contains_key(U_LIGHT_POS));

        let draws = &scene.device.draws;
        assert_eq!(draws.len(), 2);
        assert!(draws[0].off_screen);
        assert!(!draws[1].off_screen);
        assert!(draws.iter().all(|draw| draw.count == 36));
    }

    #[test]
    fn paused_scene_draws_but_never_advances() {
        let mut scene = bare_scene();
        scene.add_random_item().unwrap();
        let before = scene.items[0].pos();

        scene.tick(Duration::ZERO).unwrap();

        assert_eq!(scene.device.frames_begun, 1);
        assert_eq!(scene.items.len(), 1);
        assert_eq!(scene.items[0].pos(), before);
        assert_eq!(scene.counter, 0);
    }

    #[test]
    fn animate_parks_cubes_on_the_floor() {
        // Spawns would reshuffle the depth order mid-flight, so push the
        // next one far beyond the ticks this test runs.
        let options = SceneOptions::builder()
            .seed(7)
            .debug_grid(false)
            .min_spawn_frequency(50)
            .max_spawn_frequency(50)
            .build();
        let mut scene = scene_with(RecordingDevice::new(), options);
        scene.start(true).unwrap();
        scene.items[0].speed = 4.0;

        let floor = scene.point(0.0, GRID_SIZE as f32, 0.0).y;

        for _ in 0..12 {
            scene.tick(Duration::ZERO).unwrap();
            let y = scene.items[0].pos().y;
            assert!(y <= floor + 1e-4, "cube overshot the floor: {y} > {floor}");
        }

        let landed = scene.items[0].pos().y;
        assert!((landed - floor).abs() < 1e-4);

        scene.tick(Duration::ZERO).unwrap();
        assert!((scene.items[0].pos().y - landed).abs() < 1e-4);
    }

    #[test]
    fn press_on_a_cube_color_reports_the_hit() {
        let mut scene = bare_scene();
        scene.start(true).unwrap();

        scene.device.pick_pixel = pick_pixel_for(scene.items[0].color_id);
        let hit = scene.handle_pointer(PointerEvent::press(150.0, 100.0));

        let expected = PickHit {
            index: 0,
            id: scene.items[0].id().to_owned(),
        };
        assert_eq!(hit, Some(expected));
        // Client y flips into the bottom-left origin of the pick target.
        assert_eq!(scene.device.last_read, Some((150, 200)));
    }

    #[test]
    fn press_on_the_backdrop_and_non_press_events_miss() {
        let mut scene = bare_scene();
        scene.start(true).unwrap();

        scene.device.pick_pixel = [0, 0, 0, 255];
        assert_eq!(scene.handle_pointer(PointerEvent::press(10.0, 10.0)), None);

        scene.device.pick_pixel = pick_pixel_for(scene.items[0].color_id);
        assert_eq!(scene.handle_pointer(PointerEvent::release(10.0, 10.0)), None);
        assert_eq!(scene.handle_pointer(PointerEvent::moved(10.0, 10.0)), None);
    }

    #[test]
    fn items_stay_sorted_by_depth() {
        let mut scene = bare_scene();

        for (id, z) in [("far", 2.0), ("near", 0.0), ("mid", 1.0)] {
            let mut cube = Cube::new(&mut scene.device, id).unwrap();
            cube.move_by(glam::vec3(0.0, 0.0, z));
            scene.add_item(cube);
        }

        let order: Vec<&str> = scene.items.iter().map(|cube| cube.id()).collect();
        assert_eq!(order, vec!["near", "mid", "far"]);
    }

    #[test]
    fn removing_an_item_frees_its_buffers_exactly_once() {
        let mut scene = bare_scene();
        for _ in 0..3 {
            scene.add_random_item().unwrap();
        }
        assert_eq!(scene.device.live_buffers.len(), 12);

        scene.remove_item(1);

        assert_eq!(scene.items.len(), 2);
        assert_eq!(scene.device.live_buffers.len(), 8);
        assert_eq!(scene.device.deleted_buffers.len(), 4);
        for deleted in &scene.device.deleted_buffers {
            assert!(!scene.device.live_buffers.contains(deleted));
        }

        // Out of range is a quiet no-op.
        scene.remove_item(5);
        assert_eq!(scene.items.len(), 2);
    }

    #[test]
    fn debug_grid_fills_a_checkerboard_with_unique_pick_colors() {
        let scene = scene_with(RecordingDevice::new(), SceneOptions::builder().seed(1).build());

        assert_eq!(scene.items.len(), 128);
        assert!(scene.items.iter().all(|cube| cube.pos().z == 3.0));

        let colors: std::collections::HashSet<[u8; 4]> = scene
            .items
            .iter()
            .map(|cube| pick_pixel_for(cube.color_id))
            .collect();
        assert_eq!(colors.len(), 128);
    }

    #[test]
    fn grid_points_pass_through_at_square_aspect() {
        let scene = bare_scene();
        let warped = scene.point(3.0, 4.0, 3.0);
        assert!((warped.x - 3.0).abs() < 1e-4);
        assert!((warped.y - 4.0).abs() < 1e-4);
        assert_eq!(warped.z, 3.0);
    }

    #[test]
    fn grid_points_spread_with_a_wide_aspect() {
        let mut device = RecordingDevice::new();
        device.size = (450, 300);
        let scene = scene_with(device, bare_options());

        let warped = scene.point(3.0, 4.0, 3.0);
        assert!((warped.x - 4.2).abs() < 1e-4);
        assert!((warped.y - 4.0).abs() < 1e-4);
        assert_eq!(warped.z, 3.0);
    }

    #[test]
    fn resize_propagates_and_ignores_degenerate_sizes() {
        let mut scene = bare_scene();

        scene.resize(600, 300).unwrap();
        assert_eq!(scene.device.size, (600, 300));
        assert_eq!(scene.geometry.size(), (600.0, 300.0));
        assert_eq!(scene.camera.aspect_ratio(), 2.0);

        scene.resize(0, 300).unwrap();
        assert_eq!(scene.device.size, (600, 300));
    }
}
