//! Orbit demo application
//!
//! Builds a small solar system plus a mirrored pair of shapes, runs the
//! scheduler at a fixed step and logs where everything ends up. No window:
//! each frame's matrices are collected exactly as a renderer would pull them.
//!
//! Usage: `orbit_demo [config.toml|config.ron] [ticks]`

use std::cell::Cell;
use std::error::Error;
use std::rc::Rc;

use scene_engine::foundation::logging::{self, LevelFilter};
use scene_engine::prelude::*;

const FIXED_STEP: f32 = 1.0 / 60.0;
const DEFAULT_TICKS: u64 = 600;
const REPORT_EVERY: u64 = 120;

struct OrbitApp {
    graph: SceneGraph,
    scheduler: UpdateScheduler,
    camera: NodeId,
    triangle: NodeId,
    tracked: Vec<NodeId>,
    changed_nodes: Rc<Cell<usize>>,
}

impl OrbitApp {
    fn new(config: &SceneConfig) -> Result<Self, Box<dyn Error>> {
        let mut graph = SceneGraph::with_lens(config.lens)?;

        // Sun, planet and two moons. Orbiting bodies hold world-space poses and
        // stay attached through their coupling policy.
        let sun = graph.create_node("sun", None)?;
        graph.set_spin(sun, Some(Spin::new(Vec3::y(), 0.25)?))?;

        let planet = Self::orbiter(&mut graph, "planet", sun, Vec3::new(8.0, 0.0, 0.0), 1.0)?;
        let moon = Self::orbiter(&mut graph, "moon", planet, Vec3::new(10.0, 0.0, 0.0), 2.0)?;
        let pebble = Self::orbiter(&mut graph, "pebble", moon, Vec3::new(10.5, 0.0, 0.0), 5.0)?;
        graph.transform_mut(pebble)?.set_uniform_scale(0.1)?;

        // A spinning triangle with a square that copies its motion.
        let triangle = graph.create_node("triangle", None)?;
        graph.transform_mut(triangle)?.set_position(Vec3::new(-6.0, 3.0, 0.0))?;
        graph.set_spin(triangle, Some(Spin::new(Vec3::z(), 1.0)?))?;

        let square = graph.create_node("square", Some(triangle))?;
        graph.transform_mut(square)?.set_position(Vec3::new(-4.0, 3.0, 0.0))?;
        graph.set_coupling(square, Some(CouplingPolicy::Mirror))?;
        graph.set_composition(square, Composition::Absolute)?;

        let camera = graph.create_camera("camera", None)?;
        graph.transform_mut(camera)?.set_position(Vec3::new(0.0, 10.0, 25.0))?;
        graph.camera_mut(camera)?.look_at(Vec3::zeros())?;

        let changed_nodes = Rc::new(Cell::new(0));
        let counter = Rc::clone(&changed_nodes);
        let mut scheduler = UpdateScheduler::new(config.smoothing);
        scheduler.add_observer(move |_: &TransformEvent| counter.set(counter.get() + 1));

        log::info!("Scene built with {} nodes", graph.len());
        Ok(Self {
            graph,
            scheduler,
            camera,
            triangle,
            tracked: vec![planet, moon, pebble, triangle, square],
            changed_nodes,
        })
    }

    fn orbiter(
        graph: &mut SceneGraph,
        name: &str,
        parent: NodeId,
        position: Vec3,
        angular_velocity: f32,
    ) -> Result<NodeId, SceneError> {
        let id = graph.create_node(name, Some(parent))?;
        graph.transform_mut(id)?.set_position(position)?;
        graph.set_coupling(id, Some(CouplingPolicy::pivot_orbit(angular_velocity, Vec3::y())?))?;
        graph.set_composition(id, Composition::Absolute)?;
        Ok(id)
    }

    fn run(&mut self, ticks: u64) -> Result<(), SceneError> {
        for tick in 1..=ticks {
            // Slide the triangle back and forth; the square follows its deltas.
            if tick % REPORT_EVERY == 1 {
                let side = if (tick / REPORT_EVERY) % 2 == 0 { 2.0 } else { -2.0 };
                self.graph
                    .transform_mut(self.triangle)?
                    .move_by(Vec3::new(side, 0.0, 0.0))?;
            }

            let report = self.scheduler.tick(&mut self.graph, FIXED_STEP)?;
            for fault in &report.faults {
                log::error!("Tick {}: node {:?} rejected update: {}", report.tick, fault.node, fault.error);
            }

            let frame = FrameTransforms::collect(&mut self.graph)?;
            if tick % REPORT_EVERY == 0 {
                self.report(tick, &frame)?;
            }
        }

        log::info!(
            "Finished {} ticks, {} node changes observed",
            self.scheduler.ticks(),
            self.changed_nodes.get()
        );
        Ok(())
    }

    fn report(&mut self, tick: u64, frame: &FrameTransforms) -> Result<(), SceneError> {
        log::info!(
            "Tick {tick}: {} models, {} cameras ({} bytes)",
            frame.models().len(),
            frame.cameras().len(),
            frame.model_bytes().len() + frame.camera_bytes().len()
        );
        for &id in &self.tracked {
            let position = self.graph.world_position(id)?;
            let name = self.graph.node(id)?.name().to_owned();
            log::info!("  {name:<8} at ({:>7.3}, {:>7.3}, {:>7.3})", position.x, position.y, position.z);
        }
        let front = self.graph.camera(self.camera)?.front();
        log::debug!("  camera facing ({:.3}, {:.3}, {:.3})", front.x, front.y, front.z);
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    logging::init_with_level(LevelFilter::Info);

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => {
            log::info!("Loading scene config from {path}");
            SceneConfig::load_validated(&path)?
        }
        None => SceneConfig::default(),
    };
    let ticks = match args.next() {
        Some(count) => count.parse()?,
        None => DEFAULT_TICKS,
    };

    log::info!("Starting orbit demo for {ticks} ticks");
    let mut app = OrbitApp::new(&config)?;
    app.run(ticks)?;
    Ok(())
}
