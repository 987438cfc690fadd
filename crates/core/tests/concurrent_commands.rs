use std::{
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

use marionette_core::{
    AnimatorConfig, Controller, EngineConfig, FramePump, FrameReport, SimulatedRig,
    SmoothingSettings,
};

fn engine_config() -> EngineConfig {
    EngineConfig {
        frame_rate: 240,
        animator: AnimatorConfig {
            seed: Some(99),
            ..AnimatorConfig::default()
        },
        ..EngineConfig::default()
    }
}

#[test]
fn commands_and_pump_interleave_without_breaking_bounds() {
    let controller = Controller::new(engine_config());
    let rig = SimulatedRig::standard();
    controller.install_rig(Box::new(rig.clone())).unwrap();

    let frames = Arc::new(Mutex::new(Vec::<FrameReport>::new()));
    let sink_frames = Arc::clone(&frames);
    let pump = FramePump::new(controller.clone(), 240)
        .spawn(Box::new(move |report: &FrameReport| {
            sink_frames.lock().unwrap().push(report.clone());
        }))
        .unwrap();

    let workers: Vec<_> = (0..4)
        .map(|worker| {
            let controller = controller.clone();
            thread::spawn(move || {
                for step in 0..200 {
                    let swing = if step % 2 == 0 { 80.0 } else { -80.0 };
                    controller.set_parameter("ParamAngleX", swing).unwrap();
                    controller
                        .set_parameters([("ParamMouthOpenY", 2.0), ("ParamTail", 1.0)])
                        .unwrap();
                    if step % 50 == 0 {
                        controller.play_motion("idle", worker % 3, 2).unwrap();
                        controller.play_expression("happy").unwrap();
                    }
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }
    thread::sleep(Duration::from_millis(30));
    let produced = pump.stop().unwrap();

    assert!(produced > 0);
    let frames = frames.lock().unwrap();
    assert_eq!(frames.len() as u64, produced);
    for report in frames.iter() {
        assert!(report.skipped.is_empty());
        for update in &report.values {
            let param = controller.parameter(&update.target).unwrap();
            assert!(
                update.value >= param.min() && update.value <= param.max(),
                "{} = {} escaped its bounds",
                update.target,
                update.value
            );
        }
    }

    let info = controller.rig_info().unwrap();
    assert_eq!(info.playback.motions_dispatched, 16);
    assert_eq!(info.playback.active_expression.as_deref(), Some("happy"));
    assert!(info.locked_parameters.contains(&"ParamAngleX".to_string()));
    assert_eq!(rig.motion_log().unwrap().len(), 16);
}

#[test]
fn settings_changes_race_safely_with_ticks() {
    let controller = Controller::new(engine_config());
    controller
        .install_rig(Box::new(SimulatedRig::standard()))
        .unwrap();
    let pump = FramePump::new(controller.clone(), 240)
        .spawn(Box::new(|_: &FrameReport| {}))
        .unwrap();

    for round in 0..50 {
        controller
            .set_smoothing_settings(SmoothingSettings {
                enabled: Some(round % 3 != 0),
                window_length: Some(1 + round % 20),
            })
            .unwrap();
        controller.set_parameter("ParamBrowLY", 0.5).unwrap();
    }

    pump.stop().unwrap();
    let info = controller.smoothing_info().unwrap();
    assert_eq!(info.window_length, 1 + 49 % 20);
    assert!(info.enabled);
    let brow = controller.parameter("ParamBrowLY").unwrap().value();
    assert!((-1.0..=1.0).contains(&brow));
}
