#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse errors and validation errors are fine; panics are not.
    if let Ok(cfg) = weighnode_config::load_toml(data) {
        if cfg.validate().is_ok() {
            // A validated config must always convert and build.
            let mut node_cfg = weighnode_core::NodeCfg::from(&cfg);
            // radio mode needs a transceiver; the checks under test are mode-independent
            node_cfg.runner.mode = weighnode_core::ReportMode::Serial;
            if let Err(e) = weighnode_core::Node::builder()
                .with_scale(weighnode_core::mocks::ScriptedScale::default())
                .with_config(node_cfg)
                .try_build()
            {
                panic!("validated config rejected by builder: {e:#}");
            }
        }
    }
});
