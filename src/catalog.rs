//! Static reference data: animal codes, lotteries and the daily draw schedule.

/// Animal code → display name. `0` and `00` are distinct animals.
pub const ANIMALS: &[(&str, &str)] = &[
    ("0", "DELFIN"), ("00", "BALLENA"), ("1", "CARNERO"), ("2", "TORO"),
    ("3", "CIEMPIES"), ("4", "ALACRAN"), ("5", "LEON"), ("6", "RANA"),
    ("7", "PERICO"), ("8", "RATON"), ("9", "AGUILA"), ("10", "TIGRE"),
    ("11", "GATO"), ("12", "CABALLO"), ("13", "MONO"), ("14", "PALOMA"),
    ("15", "ZORRO"), ("16", "OSO"), ("17", "PAVO"), ("18", "BURRO"),
    ("19", "CHIVO"), ("20", "COCHINO"), ("21", "GALLO"), ("22", "CAMELLO"),
    ("23", "CEBRA"), ("24", "IGUANA"), ("25", "GALLINA"), ("26", "VACA"),
    ("27", "PERRO"), ("28", "ZAMURO"), ("29", "ELEFANTE"), ("30", "CAIMAN"),
    ("31", "LAPA"), ("32", "ARDILLA"), ("33", "PESCADO"), ("34", "VENADO"),
    ("35", "JIRAFA"), ("36", "CULEBRA"), ("37", "TORTUGA"), ("38", "BUFALO"),
    ("39", "LECHUZA"), ("40", "AVISPA"), ("41", "CANGURO"), ("42", "TUCAN"),
    ("43", "MARIPOSA"), ("44", "CHIGUIRE"), ("45", "GARZA"), ("46", "PUMA"),
    ("47", "PAVO REAL"), ("48", "PUERCOESPIN"), ("49", "PEREZA"), ("50", "CANARIO"),
    ("51", "PELICANO"), ("52", "PULPO"), ("53", "CARACOL"), ("54", "GRILLO"),
    ("55", "OSO HORMIGUERO"), ("56", "TIBURON"), ("57", "PATO"), ("58", "HORMIGA"),
    ("59", "PANTERA"), ("60", "CAMALEON"), ("61", "PANDA"), ("62", "CACHICAMO"),
    ("63", "CANGREJO"), ("64", "GAVILAN"), ("65", "ARANA"), ("66", "LOBO"),
    ("67", "AVESTRUZ"), ("68", "JAGUAR"), ("69", "CONEJO"), ("70", "BISONTE"),
    ("71", "GUACAMAYA"), ("72", "GORILA"), ("73", "HIPOPOTAMO"), ("74", "TURPIAL"),
    ("75", "GUACHARO"),
];

pub const LOTTERIES: &[&str] = &[
    "LOTTO ACTIVO",
    "LA GRANJITA",
    "LOTTO REY",
    "SELVA PLUS",
    "RULETA ACTIVA",
    "LOTTO ACT INT",
    "LOTTO ACTIVO RD",
    "GUACHARO ACTIVO",
    "LA RICACHONA",
];

pub const SCHEDULES: &[&str] = &[
    "08:00AM", "08:30AM", "09:00AM", "09:30AM", "10:00AM", "10:30AM",
    "11:00AM", "11:30AM", "12:00PM", "12:30PM", "01:00PM", "01:30PM",
    "02:00PM", "02:30PM", "03:00PM", "03:30PM", "04:00PM", "04:30PM",
    "05:00PM", "05:30PM", "06:00PM", "06:30PM", "07:00PM",
];

/// Name for an animal code, or `None` for codes outside the catalog.
pub fn animal_name(code: &str) -> Option<&'static str> {
    ANIMALS.iter().find(|(c, _)| *c == code).map(|(_, name)| *name)
}

pub fn is_animal(code: &str) -> bool {
    animal_name(code).is_some()
}

pub fn is_lottery(name: &str) -> bool {
    LOTTERIES.iter().any(|l| l.eq_ignore_ascii_case(name))
}

/// Minutes after midnight for a `HH:MMAM`/`HH:MMPM` schedule id.
pub fn schedule_minutes(schedule: &str) -> Option<u32> {
    let schedule = schedule.trim();
    if schedule.len() < 3 || !schedule.is_char_boundary(schedule.len() - 2) {
        return None;
    }
    let (clock, period) = schedule.split_at(schedule.len() - 2);
    let (hour, minute) = clock.split_once(':')?;
    let mut hour: u32 = hour.parse().ok()?;
    let minute: u32 = minute.parse().ok()?;
    if hour > 12 || minute > 59 {
        return None;
    }
    match period {
        "PM" if hour != 12 => hour += 12,
        "AM" if hour == 12 => hour = 0,
        "AM" | "PM" => {}
        _ => return None,
    }
    Some(hour * 60 + minute)
}

/// Sort schedule ids chronologically; unparseable ids sort first, in input order.
pub fn sort_schedules(schedules: &mut [String]) {
    schedules.sort_by_key(|s| schedule_minutes(s).unwrap_or(0));
}
