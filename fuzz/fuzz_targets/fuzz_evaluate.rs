#![no_main]
use flagkit_core::{EvaluationContext, FeatureFlag};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // flag JSON and context JSON separated by the first NUL byte
    let Some(split) = data.iter().position(|&b| b == 0) else {
        return;
    };
    let (flag, context) = (&data[..split], &data[split + 1..]);
    if let (Ok(flag), Ok(context)) = (
        serde_json::from_slice::<FeatureFlag>(flag),
        serde_json::from_slice::<EvaluationContext>(context),
    ) {
        let explained = flagkit_engine::explain_flag(&flag, &context);
        assert_eq!(explained.enabled, flagkit_engine::evaluate_flag(&flag, &context));
    }
});
