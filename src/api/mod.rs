pub mod oauth;
pub mod texttospeech;
pub mod youtube;
