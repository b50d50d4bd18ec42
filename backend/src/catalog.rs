//! Closed value sets stored as TEXT columns (see the CHECK constraints in
//! the initial migration).

use crate::error::FecanboError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $what:literal {
            $($variant:ident => $text:literal, $label:literal;)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant,)+
        }

        #[allow(dead_code)]
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }

            /// Human readable (Spanish) label.
            pub fn label(&self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = FecanboError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($text => Ok($name::$variant),)+
                    other => Err(FecanboError::Validation(format!(
                        "{}: '{}'",
                        $what, other
                    ))),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

text_enum! {
    /// Crop lifecycle stage, in canonical order.
    Etapa, "Etapa inválida" {
        Germinacion => "germinacion", "Germinación";
        Vegetativo => "vegetativo", "Vegetativo";
        Floracion => "floracion", "Floración";
        Cosecha => "cosecha", "Cosecha";
        Secado => "secado", "Secado";
        Curado => "curado", "Curado";
        Finalizado => "finalizado", "Finalizado";
    }
}

impl Etapa {
    /// Stages shown on the dashboard chart.
    pub const CHART: &'static [Etapa] = &[
        Etapa::Germinacion,
        Etapa::Vegetativo,
        Etapa::Floracion,
        Etapa::Cosecha,
        Etapa::Secado,
    ];

    pub fn position(&self) -> usize {
        Etapa::ALL.iter().position(|e| e == self).unwrap_or(0)
    }

    pub fn next(&self) -> Option<Etapa> {
        Etapa::ALL.get(self.position() + 1).copied()
    }

    /// Typical duration shown in the crop timeline.
    pub fn typical_duration(&self) -> &'static str {
        match self {
            Etapa::Germinacion => "3-10 dias",
            Etapa::Vegetativo => "3-8 semanas",
            Etapa::Floracion => "7-9 semanas",
            Etapa::Cosecha => "1-3 dias",
            Etapa::Secado => "7-14 dias",
            Etapa::Curado => "2-4 semanas",
            Etapa::Finalizado => "-",
        }
    }
}

text_enum! {
    TipoAlerta, "Tipo de alerta inválido" {
        Riego => "riego", "Riego";
        Poda => "poda", "Poda";
        Nutricion => "nutricion", "Nutrición";
        ControlPlagas => "control_plagas", "Control de plagas";
        Defoliacion => "defoliacion", "Defoliación";
        Transplante => "transplante", "Transplante";
        CambioFotoperiodo => "cambio_fotoperiodo", "Cambio de fotoperiodo";
        Cosecha => "cosecha", "Cosecha";
        Otro => "otro", "Otro";
    }
}

text_enum! {
    PrioridadAlerta, "Prioridad inválida" {
        Baja => "baja", "Baja";
        Media => "media", "Media";
        Alta => "alta", "Alta";
        Urgente => "urgente", "Urgente";
    }
}

text_enum! {
    TipoObservacion, "Tipo de observación inválido" {
        General => "general", "General";
        Riego => "riego", "Riego";
        Nutricion => "nutricion", "Nutrición";
        Problema => "problema", "Problema";
        Mejora => "mejora", "Mejora";
        Foto => "foto", "Foto";
    }
}

text_enum! {
    TipoProducto, "Tipo de producto inválido" {
        Flor => "flor", "Flor";
        Aceite => "aceite", "Aceite";
        Extracto => "extracto", "Extracto";
        Otro => "otro", "Otro";
    }
}

impl TipoProducto {
    /// Maps the delivery form's product choice; unknown or missing values
    /// fall back to flower.
    pub fn from_form(value: Option<&str>) -> TipoProducto {
        match value.map(str::trim).unwrap_or_default() {
            "flores" | "flor" => TipoProducto::Flor,
            "aceite" => TipoProducto::Aceite,
            "extracto" => TipoProducto::Extracto,
            "crema" | "otro" => TipoProducto::Otro,
            _ => TipoProducto::Flor,
        }
    }
}

text_enum! {
    MetodoCultivo, "Método de cultivo inválido" {
        Interior => "interior", "Interior";
        Exterior => "exterior", "Exterior";
        Invernadero => "invernadero", "Invernadero";
        Mixto => "mixto", "Mixto";
    }
}

impl MetodoCultivo {
    /// Maps the create form's `tipo_cultivo` choice (indoor/outdoor/greenhouse).
    pub fn from_form(value: Option<&str>) -> MetodoCultivo {
        match value.map(str::trim).unwrap_or_default() {
            "indoor" | "interior" => MetodoCultivo::Interior,
            "outdoor" | "exterior" => MetodoCultivo::Exterior,
            "greenhouse" | "invernadero" => MetodoCultivo::Invernadero,
            "mixto" => MetodoCultivo::Mixto,
            _ => MetodoCultivo::Interior,
        }
    }
}

text_enum! {
    MedioCultivo, "Medio de cultivo inválido" {
        Tierra => "tierra", "Tierra";
        Coco => "coco", "Coco";
        Hidroponico => "hidroponico", "Hidropónico";
        Aeroponico => "aeroponico", "Aeropónico";
        Mixto => "mixto", "Mixto";
    }
}

impl MedioCultivo {
    pub fn from_form(value: Option<&str>) -> MedioCultivo {
        value
            .and_then(|v| v.parse().ok())
            .unwrap_or(MedioCultivo::Tierra)
    }
}
