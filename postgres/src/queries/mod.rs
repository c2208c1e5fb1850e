mod position;
mod quality;
mod vessel;
