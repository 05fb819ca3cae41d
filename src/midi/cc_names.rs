//! General MIDI controller names

/// Controller numbers with a well-known General MIDI meaning
const CC_NAMES: &[(u8, &str)] = &[
    (0, "Bank Select"),
    (1, "Modulation"),
    (2, "Breath Controller"),
    (3, "Undefined"),
    (4, "Foot Controller"),
    (5, "Portamento Time"),
    (6, "Data Entry Most Significant Bit(MSB)"),
    (7, "Volume"),
    (8, "Balance"),
    (9, "Undefined"),
    (10, "Pan"),
    (11, "Expression"),
    (12, "Effect Controller 1"),
    (13, "Effect Controller 2"),
    (64, "Damper Pedal / Sustain Pedal"),
    (65, "Portamento On/Off Switch"),
    (66, "Sostenuto On/Off Switch"),
    (67, "Soft Pedal On/Off Switch"),
    (68, "Legato FootSwitch"),
    (69, "Hold 2"),
    (70, "Sound Controller 1"),
    (71, "Sound Controller 2"),
    (72, "Sound Controller 3"),
    (73, "Sound Controller 4"),
    (74, "Sound Controller 5"),
    (75, "Sound Controller 6"),
    (76, "Sound Controller 7"),
    (77, "Sound Controller 8"),
    (78, "Sound Controller 9"),
    (79, "Sound Controller 10"),
    (80, "General Purpose MIDI CC Controller"),
    (81, "General Purpose MIDI CC Controller"),
    (82, "General Purpose MIDI CC Controller"),
    (83, "General Purpose MIDI CC Controller"),
    (84, "Portamento CC Control"),
    (91, "Effect 1 Depth"),
    (92, "Effect 2 Depth"),
    (93, "Effect 3 Depth"),
    (94, "Effect 4 Depth"),
    (95, "Effect 5 Depth"),
    (96, "(+1) Data Increment"),
    (97, "(-1) Data Decrement"),
    (98, "Non-Registered Parameter Number LSB (NRPN)"),
    (99, "Non-Registered Parameter Number MSB (NRPN)"),
    (100, "Registered Parameter Number LSB (RPN)"),
    (101, "Registered Parameter Number MSB (RPN)"),
    (120, "All Sound Off"),
    (121, "Reset All Controllers"),
    (122, "Local On/Off Switch"),
    (123, "All Notes Off"),
    (124, "Omni Mode Off"),
    (125, "Omni Mode On"),
    (126, "Mono Mode"),
    (127, "Poly Mode"),
];

/// Look up the General MIDI name of a controller number
///
/// Unmapped numbers return `None`.
pub fn cc_name(cc: u8) -> Option<&'static str> {
    CC_NAMES
        .binary_search_by_key(&cc, |(number, _)| *number)
        .ok()
        .map(|idx| CC_NAMES[idx].1)
}
