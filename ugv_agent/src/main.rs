use eyre::Result;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use ugv_agent::{Agent, AgentConfig};
use ugv_cam_lib::{init_tracing, Command};

const STEP_INTERVAL: Duration = Duration::from_millis(100);

fn main() -> Result<()> {
    init_tracing()?;

    // UGV_AGENT_CONFIG points at a TOML file, environment variables win over it
    let config = match std::env::var("UGV_AGENT_CONFIG") {
        Ok(path) => AgentConfig::load_from_file(&path)?.with_env_overrides(),
        Err(_) => AgentConfig::from_env(),
    };

    info!("Starting UGV camera agent");
    info!("  Vehicle: {}", config.command_url());
    info!("  Camera: {}", config.stream_url());

    let mut agent = Agent::from_config(config)?;

    let result = run_demo(&agent);
    if let Err(e) = agent.close() {
        warn!("Agent did not shut down cleanly: {}", e);
    }
    result
}

fn run_demo(agent: &Agent) -> Result<()> {
    info!("Moving forward...");
    drive(agent, Command::speed(0.3, 0.3), Duration::from_secs(2), |state| {
        if let Some(feedback) = state.feedback() {
            info!(
                "Speed: L={:.2}, R={:.2}, Battery: {:.2}V",
                feedback.left, feedback.right, feedback.voltage
            );
        }
    })?;

    info!("Turning right...");
    drive(agent, Command::speed(0.3, -0.3), Duration::from_secs(1), |state| {
        if let Some(feedback) = state.feedback() {
            info!(
                "Speed: L={:.2}, R={:.2}, Roll: {:.2}, Pitch: {:.2}",
                feedback.left, feedback.right, feedback.roll, feedback.pitch
            );
        }
    })?;

    info!("Stopping...");
    agent.step(&Command::stop())?;

    info!("Getting IMU data...");
    let state = agent.step(&Command::get_imu_data())?;
    if let Some(sensors) = state.sensors() {
        info!("IMU data: Roll={:.2}, Pitch={:.2}", sensors.roll, sensors.pitch);
        if let (Some(ax), Some(ay), Some(az)) = (sensors.accel_x, sensors.accel_y, sensors.accel_z) {
            info!("Accelerometer: X={:.2}, Y={:.2}, Z={:.2}", ax, ay, az);
        }
    }

    let stats = agent.frame_stats();
    info!(
        "Camera: {} frames decoded, {} dropped, {} bytes read",
        stats.frames_decoded, stats.frames_dropped, stats.bytes_read
    );
    Ok(())
}

/// Repeat `command` every step interval for `duration`
fn drive<F>(agent: &Agent, command: Command, duration: Duration, report: F) -> Result<()>
where
    F: Fn(&ugv_cam_lib::State),
{
    let start = Instant::now();
    while start.elapsed() < duration {
        let state = agent.step(&command)?;
        report(&state);
        thread::sleep(STEP_INTERVAL);
    }
    Ok(())
}
