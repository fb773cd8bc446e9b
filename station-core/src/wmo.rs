//! WMO weather interpretation codes, as used by Open-Meteo.
//! See: https://open-meteo.com/en/docs#weathervariables

/// Short description for a WMO weather code; `"unknown"` for anything unmapped.
pub fn weather_description(code: i32) -> &'static str {
    match code {
        0 => "clear sky",
        1 => "mainly clear",
        2 => "partly cloudy",
        3 => "overcast",
        45 => "fog",
        48 => "depositing rime fog",
        51 => "light drizzle",
        53 => "moderate drizzle",
        55 => "dense drizzle",
        56 => "light freezing drizzle",
        57 => "dense freezing drizzle",
        61 => "slight rain",
        63 => "moderate rain",
        65 => "heavy rain",
        66 => "light freezing rain",
        67 => "heavy freezing rain",
        71 => "slight snow fall",
        73 => "moderate snow fall",
        75 => "heavy snow fall",
        77 => "snow grains",
        80 => "slight rain showers",
        81 => "moderate rain showers",
        82 => "violent rain showers",
        85 => "slight snow showers",
        86 => "heavy snow showers",
        95 => "thunderstorm",
        96 => "thunderstorm with slight hail",
        99 => "thunderstorm with hail",
        _ => "unknown",
    }
}

/// Icon key for a WMO code: the code followed by `d` (day) or `n` (night).
pub fn weather_icon(code: i32, is_day: bool) -> String {
    format!("{code}{}", if is_day { 'd' } else { 'n' })
}
