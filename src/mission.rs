use crate::lights::DeviceRegistry;

/// Canned reply placed after the mission so the model starts out compliant.
pub const ACKNOWLEDGEMENT: &str = "OK.";

const MISSION_INTRO: &str = "Hello.
I would like you to control the Hue light-bulbs in my house.
I will use natural language to ask you to do something with my Hue bulbs, and you should call the \
turn_on_or_off or set_brightness function to do the thing I want.
Brightness goes from 0 (dimmest) to 254 (brightest).";

const BREVITY: &str = "Please ensure that all of your responses are 20 words or less.
Please say \"OK\" now if you understand.";

/// Mission statement listing every addressable light, followed by the
/// household notes (if any) and the brevity instruction.
pub fn build_mission(registry: &DeviceRegistry, household_notes: Option<&str>) -> String {
    let mut parts = vec![MISSION_INTRO.to_string(), registry.describe()];
    if let Some(notes) = household_notes.map(str::trim).filter(|n| !n.is_empty()) {
        parts.push(notes.to_string());
    }
    parts.push(BREVITY.to_string());
    parts.join("\n")
}
