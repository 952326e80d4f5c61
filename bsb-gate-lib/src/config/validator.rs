use crate::config::types::GateConfig;

pub fn validate(config: &GateConfig) -> Result<(), String> {
    let rl = &config.rate_limit;
    if rl.max_requests == 0 {
        return Err("max_requests must be > 0".into());
    }
    if rl.window_seconds == 0 {
        return Err("window_seconds must be > 0".into());
    }
    if rl.max_clients == 0 {
        return Err("max_clients must be > 0".into());
    }
    if rl.shards == 0 {
        return Err("shards must be > 0".into());
    }
    Ok(())
}
