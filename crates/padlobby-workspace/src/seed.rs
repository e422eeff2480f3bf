use padlobby_gamepad::codes;

use crate::profile::TypeDefault;

struct Seed {
    name: &'static str,
    image: &'static str,
    sound: &'static str,
    ids: Option<(u16, u16)>,
    guid_override: Option<&'static str>,
    start_button: Option<u16>,
}

const fn ids(name: &'static str, image: &'static str, sound: &'static str, vendor: u16, product: u16) -> Seed {
    Seed {
        name,
        image,
        sound,
        ids: Some((vendor, product)),
        guid_override: None,
        start_button: None,
    }
}

const SEEDS: &[Seed] = &[
    ids("Xbox Wireless Controller", "xbox-one.png", "xbox-one.mp3", 0x045e, 0x0b13),
    ids("Xbox One Controller", "xbox-one.png", "xbox-one.mp3", 0x045e, 0x02ea),
    ids("Xbox Controller", "xbox-one.png", "xbox-one.mp3", 0x045e, 0x0b12),
    ids("Switch Pro Controller", "switch_pro.png", "switch.mp3", 0x057e, 0x2009),
    ids("Joy-Con (L)", "joycon_l.png", "switch.mp3", 0x057e, 0x2006),
    ids("Joy-Con (R)", "joycon_r.png", "switch.mp3", 0x057e, 0x2007),
    ids("GameCube Controller Adapter", "gamecube.png", "switch_gamecube.mp3", 0x057e, 0x0337),
    // Reports zero ids over Bluetooth; emulators see it as a Switch Pro.
    Seed {
        name: "Lic Pro Controller",
        image: "switch_gamecube.png",
        sound: "switch_gamecube.mp3",
        ids: None,
        guid_override: Some("030000007e0500000920000000006806"),
        start_button: Some(codes::BTN_TR2),
    },
    ids("DualShock 4", "default.png", "default.mp3", 0x054c, 0x09cc),
    ids("DualSense", "default.png", "default.mp3", 0x054c, 0x0ce6),
    Seed {
        start_button: Some(codes::BTN_TR2),
        ..ids("SNES Controller", "snes.png", "snes.wav", 0x057e, 0x2017)
    },
    Seed {
        ids: None,
        ..ids("8BitDo", "default.png", "default.mp3", 0, 0)
    },
];

/// Built-in controller type defaults, in lookup order.
pub fn seed_type_defaults() -> Vec<TypeDefault> {
    SEEDS
        .iter()
        .map(|seed| TypeDefault {
            name: seed.name.to_string(),
            image: seed.image.to_string(),
            sound: seed.sound.to_string(),
            ids: seed.ids,
            guid_override: seed.guid_override.map(str::to_string),
            start_button: seed.start_button,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::is_valid_guid;

    #[test]
    fn seed_ids_are_unique() {
        let seeds = seed_type_defaults();
        let mut ids: Vec<(u16, u16)> = seeds.iter().filter_map(|t| t.ids).collect();
        let total = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), total);
    }

    #[test]
    fn seed_guid_overrides_are_well_formed() {
        for seed in seed_type_defaults() {
            if let Some(guid) = seed.guid_override {
                assert!(is_valid_guid(&guid), "{}", seed.name);
            }
        }
    }

    #[test]
    fn snes_and_lic_pro_use_tr2_as_start() {
        let seeds = seed_type_defaults();
        let start_of = |name: &str| seeds.iter().find(|t| t.name == name).and_then(|t| t.start_button);
        assert_eq!(start_of("SNES Controller"), Some(codes::BTN_TR2));
        assert_eq!(start_of("Lic Pro Controller"), Some(codes::BTN_TR2));
        assert_eq!(start_of("Switch Pro Controller"), None);
    }
}
